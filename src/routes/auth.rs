use actix_web::HttpRequest;
use secrecy::ExposeSecret;

use crate::config::SecuritySettings;

fn bearer_token(request: &HttpRequest) -> Option<&str> {
    request
        .headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Scheduling triggers carry the shared cron secret; the hosting
/// platform's own cron fires without it but with a recognizable agent.
pub fn is_authorized_cron(request: &HttpRequest, security: &SecuritySettings) -> bool {
    let from_trusted_platform = request
        .headers()
        .get("User-Agent")
        .and_then(|agent| agent.to_str().ok())
        .map(|agent| agent.contains(&security.trusted_cron_agent))
        .unwrap_or(false);

    if from_trusted_platform {
        return true;
    }

    bearer_token(request)
        .map(|token| token == security.cron_secret.expose_secret())
        .unwrap_or(false)
}

pub fn is_authorized_admin(request: &HttpRequest, security: &SecuritySettings) -> bool {
    bearer_token(request)
        .map(|token| token == security.admin_key.expose_secret())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{is_authorized_admin, is_authorized_cron};
    use crate::config::SecuritySettings;
    use actix_web::test::TestRequest;
    use secrecy::Secret;

    fn security() -> SecuritySettings {
        SecuritySettings {
            cron_secret: Secret::new(String::from("cron-secret")),
            admin_key: Secret::new(String::from("admin-key")),
            trusted_cron_agent: String::from("vercel-cron"),
        }
    }

    #[test]
    fn valid_cron_secret_is_accepted() {
        let request = TestRequest::get()
            .insert_header(("Authorization", "Bearer cron-secret"))
            .to_http_request();

        assert!(is_authorized_cron(&request, &security()));
    }

    #[test]
    fn missing_or_wrong_secret_is_rejected() {
        let request = TestRequest::get().to_http_request();
        assert!(!is_authorized_cron(&request, &security()));

        let request = TestRequest::get()
            .insert_header(("Authorization", "Bearer wrong"))
            .to_http_request();
        assert!(!is_authorized_cron(&request, &security()));

        let request = TestRequest::get()
            .insert_header(("Authorization", "cron-secret"))
            .to_http_request();
        assert!(!is_authorized_cron(&request, &security()));
    }

    #[test]
    fn trusted_platform_agent_bypasses_the_secret() {
        let request = TestRequest::get()
            .insert_header(("User-Agent", "vercel-cron/1.0"))
            .to_http_request();

        assert!(is_authorized_cron(&request, &security()));
    }

    #[test]
    fn admin_key_is_not_interchangeable_with_cron_secret() {
        let request = TestRequest::get()
            .insert_header(("Authorization", "Bearer cron-secret"))
            .to_http_request();

        assert!(!is_authorized_admin(&request, &security()));

        let request = TestRequest::get()
            .insert_header(("Authorization", "Bearer admin-key"))
            .to_http_request();

        assert!(is_authorized_admin(&request, &security()));
    }
}
