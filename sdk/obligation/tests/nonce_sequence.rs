use shadowlend_cipher::{SharedSecret, encrypt};
use shadowlend_obligation::{
    ENCRYPTED_STATE_LEN, ProgramAccount, Slot, UserObligation, decrypt_slot, has_advanced,
};

/// Ledger-side effect of one accepted callback: re-encrypt and bump the nonce.
fn apply_callback(obligation: &mut UserObligation, secret: &SharedSecret, deposit: u64) {
    let nonce = obligation.state_nonce + 1;
    let blocks = encrypt(secret, &[deposit, 0, 0], nonce).unwrap();
    let mut state = [0u8; ENCRYPTED_STATE_LEN];
    for (i, block) in blocks.iter().enumerate() {
        state[i * 32..(i + 1) * 32].copy_from_slice(&block.ciphertext);
    }
    obligation.encrypted_state = state;
    obligation.state_nonce = nonce;
}

#[test]
fn observed_nonces_strictly_increase() {
    let secret = SharedSecret::from_key_bytes([5u8; 32]);
    let mut obligation = UserObligation {
        user: [1u8; 32],
        pool: [2u8; 32],
        encrypted_state: [0u8; ENCRYPTED_STATE_LEN],
        state_commitment: [0u8; 32],
        state_nonce: 0,
        is_initialized: false,
        bump: 250,
    };

    let mut observed: Vec<u128> = Vec::new();
    let mut last: Option<u128> = None;
    for deposit in [100u64, 250, 400, 900] {
        apply_callback(&mut obligation, &secret, deposit);

        let fetched = UserObligation::decode(&obligation.encode().unwrap()).unwrap();
        assert!(has_advanced(last, Some(fetched.state_nonce)));
        assert_eq!(
            decrypt_slot(
                &fetched.encrypted_state,
                Slot::Deposit,
                &secret,
                fetched.state_nonce
            )
            .unwrap(),
            deposit
        );

        observed.push(fetched.state_nonce);
        last = Some(fetched.state_nonce);
    }

    assert_eq!(observed, vec![1, 2, 3, 4]);
    assert!(observed.windows(2).all(|w| w[1] > w[0]));
}
