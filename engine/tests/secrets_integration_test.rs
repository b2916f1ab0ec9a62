use secure_updates_engine::secrets::{SecretManager, SecretString};

#[test]
fn test_api_key_keychain_round_trip() {
    if std::env::var("CI").is_ok() {
        return; // Skip: no keyring in CI
    }
    let manager = SecretManager::new("secure-updates-integration-test")
        .with_env_var("SECURE_UPDATES_INTEGRATION_TEST_UNSET");

    let value = SecretString::new("integration-api-key-123");
    if manager.set_api_key(&value).is_err() {
        return; // Skip: no usable keyring backend
    }

    let retrieved = manager
        .resolve_api_key()
        .expect("Failed to retrieve API key");
    assert_eq!(retrieved.unsecure(), value.unsecure());

    manager.delete_api_key().expect("Failed to delete API key");
}

#[test]
fn test_environment_overrides_keychain() {
    let var = "SECURE_UPDATES_INTEGRATION_TEST_KEY";
    std::env::set_var(var, "from-environment");
    let manager = SecretManager::new("secure-updates-integration-test").with_env_var(var);

    let key = manager.resolve_api_key().unwrap();
    assert_eq!(key.unsecure(), "from-environment");

    std::env::remove_var(var);
}

#[test]
fn test_api_key_never_printed() {
    let key = SecretString::new("super-secret-key");
    assert!(!format!("{:?}", key).contains("super-secret-key"));
    assert!(!format!("{}", key).contains("super-secret-key"));
}
