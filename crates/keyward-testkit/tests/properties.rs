//! Properties of issued client credentials.

use proptest::prelude::*;

use keyward_core::GrantId;
use keyward_grants::{AccessRegistration, ClientTokenType, GrantsError};
use keyward_testkit::generators::symmetric_key;

fn client_type() -> impl Strategy<Value = ClientTokenType> {
    prop_oneof![
        Just(ClientTokenType::Other),
        Just(ClientTokenType::YouAuth),
        Just(ClientTokenType::RemoteNotificationSubscriber),
    ]
}

proptest! {
    #[test]
    fn test_issued_token_unlocks_registration(
        grant_key in symmetric_key(),
        client_type in client_type(),
    ) {
        let (registration, token) =
            AccessRegistration::issue(Some(GrantId::generate()), Some(&grant_key), client_type, 0).unwrap();

        let unlocked = registration.unlock(&token.access_token_half_key).unwrap();
        prop_assert_eq!(&unlocked.shared_secret, &token.shared_secret);
        prop_assert_eq!(unlocked.grant_key_store_key, Some(grant_key));
    }

    #[test]
    fn test_forged_half_never_unlocks(grant_key in symmetric_key(), forged in symmetric_key()) {
        let (registration, token) =
            AccessRegistration::issue(None, Some(&grant_key), ClientTokenType::Other, 0).unwrap();
        prop_assume!(forged != token.access_token_half_key);

        prop_assert!(registration.unlock(&forged).is_err());
    }

    #[test]
    fn test_revoked_registration_never_unlocks(grant_key in symmetric_key()) {
        let (mut registration, token) =
            AccessRegistration::issue(None, Some(&grant_key), ClientTokenType::Other, 0).unwrap();
        registration.revoke();

        prop_assert!(matches!(
            registration.unlock(&token.access_token_half_key),
            Err(GrantsError::RegistrationRevoked)
        ));
    }
}

#[test]
fn test_registration_without_grant_key() {
    let (registration, token) =
        AccessRegistration::issue(None, None, ClientTokenType::Other, 0).unwrap();
    let unlocked = registration.unlock(&token.access_token_half_key).unwrap();
    assert!(unlocked.grant_key_store_key.is_none());
}
