//! Fixed identifiers shared across tests.

/// Identity provider tenant domain.
pub const TEST_DOMAIN: &str = "tenant.example.com";

/// Issuer derived from [`TEST_DOMAIN`].
pub const TEST_ISSUER: &str = "https://tenant.example.com/";

/// API identifier tokens are minted for.
pub const TEST_AUDIENCE: &str = "https://api.example.com";

/// Method ARN of the invoked endpoint.
pub const TEST_METHOD_ARN: &str =
    "arn:aws:execute-api:us-east-1:123456789012:abcdef1234/prod/GET/items";

/// Key ID of the default Ed25519 test key.
pub const TEST_ED25519_KID: &str = "ed25519-key-01";

/// Key ID of the default RSA test key.
pub const TEST_RSA_KID: &str = "rsa-key-01";
