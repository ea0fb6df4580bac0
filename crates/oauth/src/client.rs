use secrecy::SecretString;

/// Which of the two registered OAuth clients a request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tenant {
    Admin,
    User,
}

/// Credentials and frontend location for one registered client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Where the browser is sent after callback and logout.
    pub frontend_url: String,
}

/// The closed two-tenant client set. This is deliberately an enumeration,
/// not an extensible registry: the platform has exactly an admin persona
/// and a user persona.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    admin: ClientConfig,
    user: ClientConfig,
}

impl ClientRegistry {
    pub fn new(admin: ClientConfig, user: ClientConfig) -> Self {
        Self { admin, user }
    }

    /// Pick the tenant for a request. An explicit `client=admin` parameter
    /// wins; otherwise a hostname containing "admin" selects the admin
    /// client; everything else is the user client.
    pub fn tenant_for(host: &str, explicit: Option<&str>) -> Tenant {
        let explicit_admin = explicit.is_some_and(|p| p.eq_ignore_ascii_case("admin"));
        if explicit_admin || host.to_ascii_lowercase().contains("admin") {
            Tenant::Admin
        } else {
            Tenant::User
        }
    }

    pub fn resolve(&self, host: &str, explicit: Option<&str>) -> &ClientConfig {
        match Self::tenant_for(host, explicit) {
            Tenant::Admin => &self.admin,
            Tenant::User => &self.user,
        }
    }

    pub fn get(&self, tenant: Tenant) -> &ClientConfig {
        match tenant {
            Tenant::Admin => &self.admin,
            Tenant::User => &self.user,
        }
    }
}
