use validator::validate_email;

/// Case-normalized, validated subscriber address. The email is the
/// subscriber's identity, so normalization happens here and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(email: String) -> Result<SubscriberEmail, String> {
        let normalized = email.trim().to_lowercase();

        if !validate_email(&normalized) {
            return Err(format!("{} email is not valid", normalized));
        }

        Ok(Self(normalized))
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriberEmail;
    use claim::{assert_err, assert_ok};
    use fake::{faker::internet::en::SafeEmail, Fake};

    #[test]
    fn empty_email_is_rejected() {
        let email = "".to_string();

        assert_err!(SubscriberEmail::parse(email));
    }

    #[test]
    fn email_missing_at_symbol_is_rejected() {
        let email = "ayse-example.com".to_string();

        assert_err!(SubscriberEmail::parse(email));
    }

    #[test]
    fn email_missing_subject_is_rejected() {
        let email = "@example.com".to_string();

        assert_err!(SubscriberEmail::parse(email));
    }

    #[test]
    fn email_valid_is_accepted() {
        let email = SafeEmail().fake();

        assert_ok!(SubscriberEmail::parse(email));
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        let email = SubscriberEmail::parse(String::from("  Ayse.Yilmaz@Example.COM ")).unwrap();

        assert_eq!(email.as_ref(), "ayse.yilmaz@example.com");
    }
}
