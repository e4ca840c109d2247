//! Signature-based authorization: recover who signed, then check them against
//! a role or an exact identity.

use std::sync::Arc;
use thiserror::Error;
use crate::crypto::{recover_signer, Address, Bytes32, CryptoError, RecoverableSignature};
use crate::roles::{Role, RoleAuthority};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("invalid admin signature, recovered {0}")]
    InvalidAdminSignature(Address),
    #[error("invalid player signature, expected {expected}, recovered {recovered}")]
    InvalidPlayerSignature { expected: Address, recovered: Address },
    #[error("malformed signature: {0}")]
    Malformed(#[from] CryptoError),
}

/// Who must have signed a message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequiredSigner {
    /// Any identity holding the role
    Role(Role),
    /// Exactly this identity
    Identity(Address),
}

pub struct AuthorizationVerifier {
    roles: Arc<dyn RoleAuthority>,
}

impl AuthorizationVerifier {
    pub fn new(roles: Arc<dyn RoleAuthority>) -> Self {
        Self { roles }
    }

    /// Returns the recovered signer on success. Pure: nothing is recorded.
    pub fn verify(
        &self,
        message: &Bytes32,
        signature: &RecoverableSignature,
        required: RequiredSigner,
    ) -> Result<Address, AuthError> {
        let recovered = recover_signer(message, signature)?;
        match required {
            RequiredSigner::Role(role) => {
                if self.roles.has_role(&recovered, role) {
                    Ok(recovered)
                } else {
                    Err(AuthError::InvalidAdminSignature(recovered))
                }
            }
            RequiredSigner::Identity(expected) => {
                if recovered == expected {
                    Ok(recovered)
                } else {
                    Err(AuthError::InvalidPlayerSignature { expected, recovered })
                }
            }
        }
    }

    pub fn verify_admin(&self, message: &Bytes32, signature: &RecoverableSignature) -> Result<Address, AuthError> {
        self.verify(message, signature, RequiredSigner::Role(Role::Admin))
    }

    pub fn verify_player(
        &self,
        message: &Bytes32,
        signature: &RecoverableSignature,
        player: Address,
    ) -> Result<Address, AuthError> {
        self.verify(message, signature, RequiredSigner::Identity(player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{hash_lifecycle_message, KeyPair};
    use crate::roles::StaticRoleAuthority;

    fn setup() -> (KeyPair, AuthorizationVerifier) {
        let admin = KeyPair::new();
        let roles = Arc::new(StaticRoleAuthority::new([admin.address()]));
        (admin, AuthorizationVerifier::new(roles))
    }

    #[test]
    fn test_admin_signature_accepted() {
        let (admin, verifier) = setup();
        let player = KeyPair::new().address();
        let msg = hash_lifecycle_message(&player, &[1u8; 32], 10);
        let sig = admin.sign_message(&msg).unwrap();
        assert_eq!(verifier.verify_admin(&msg, &sig).unwrap(), admin.address());
    }

    #[test]
    fn test_non_admin_signature_reports_recovered_identity() {
        let (_admin, verifier) = setup();
        let intruder = KeyPair::new();
        let msg = hash_lifecycle_message(&intruder.address(), &[1u8; 32], 10);
        let sig = intruder.sign_message(&msg).unwrap();
        assert_eq!(
            verifier.verify_admin(&msg, &sig),
            Err(AuthError::InvalidAdminSignature(intruder.address()))
        );
    }

    #[test]
    fn test_player_signature_must_match_exactly() {
        let (admin, verifier) = setup();
        let player = KeyPair::new();
        let msg = hash_lifecycle_message(&player.address(), &[2u8; 32], 20);

        let good = player.sign_message(&msg).unwrap();
        assert!(verifier.verify_player(&msg, &good, player.address()).is_ok());

        // An admin signature does not stand in for the player's own.
        let wrong = admin.sign_message(&msg).unwrap();
        assert_eq!(
            verifier.verify_player(&msg, &wrong, player.address()),
            Err(AuthError::InvalidPlayerSignature {
                expected: player.address(),
                recovered: admin.address(),
            })
        );
    }

    #[test]
    fn test_signature_over_other_message_fails() {
        let (admin, verifier) = setup();
        let player = KeyPair::new().address();
        let signed = hash_lifecycle_message(&player, &[1u8; 32], 1000);
        let sig = admin.sign_message(&signed).unwrap();

        for tampered in [
            hash_lifecycle_message(&KeyPair::new().address(), &[1u8; 32], 1000),
            hash_lifecycle_message(&player, &[9u8; 32], 1000),
            hash_lifecycle_message(&player, &[1u8; 32], 1001),
        ] {
            assert!(verifier.verify_admin(&tampered, &sig).is_err());
        }
    }
}
