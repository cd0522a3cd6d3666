use serde::Deserialize;

use crate::domain::category::CategorySet;
use crate::domain::frequency::NotificationFrequency;
use crate::domain::subscriber_email::SubscriberEmail;

pub const DEFAULT_NOTIFICATION_HOUR: u32 = 21;

/// A validated signup / preference-update request.
#[derive(Debug)]
pub struct NewSubscriber {
    pub email: SubscriberEmail,
    pub categories: CategorySet,
    pub notification_hour: u32,
    pub frequency: NotificationFrequency,
}

#[derive(Deserialize)]
pub struct NewSubscriberBody {
    pub email: String,
    /// Either a JSON array of tokens or a single comma-separated string.
    pub categories: CategoryTokens,
    pub notification_hour: Option<u32>,
    pub notification_frequency: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum CategoryTokens {
    List(Vec<String>),
    Flat(String),
}

impl CategoryTokens {
    fn into_token_string(self) -> String {
        match self {
            CategoryTokens::Flat(tokens) => tokens,
            CategoryTokens::List(tokens) => tokens.join(","),
        }
    }
}

impl TryFrom<NewSubscriberBody> for NewSubscriber {
    type Error = String;

    fn try_from(body: NewSubscriberBody) -> Result<Self, Self::Error> {
        let email = SubscriberEmail::parse(body.email)?;
        let categories = CategorySet::parse(&body.categories.into_token_string())?;

        let notification_hour = body.notification_hour.unwrap_or(DEFAULT_NOTIFICATION_HOUR);
        if notification_hour > 23 {
            return Err(format!(
                "{} is not a valid notification hour",
                notification_hour
            ));
        }

        let frequency = match body.notification_frequency {
            Some(token) => NotificationFrequency::parse(&token)?,
            None => NotificationFrequency::Daily,
        };

        Ok(NewSubscriber {
            email,
            categories,
            notification_hour,
            frequency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CategoryTokens, NewSubscriber, NewSubscriberBody};
    use crate::domain::frequency::NotificationFrequency;
    use claim::{assert_err, assert_ok};

    fn body(
        email: &str,
        categories: CategoryTokens,
        hour: Option<u32>,
        frequency: Option<&str>,
    ) -> NewSubscriberBody {
        NewSubscriberBody {
            email: email.to_string(),
            categories,
            notification_hour: hour,
            notification_frequency: frequency.map(String::from),
        }
    }

    #[test]
    fn valid_body_is_accepted() {
        let body = body(
            "ali@example.com",
            CategoryTokens::List(vec![String::from("doviz"), String::from("borsa")]),
            Some(9),
            Some("twice"),
        );

        let subscriber = assert_ok!(NewSubscriber::try_from(body));

        assert_eq!(subscriber.email.as_ref(), "ali@example.com");
        assert_eq!(subscriber.notification_hour, 9);
        assert_eq!(subscriber.frequency, NotificationFrequency::Twice);
        assert_eq!(subscriber.categories.to_token_string(), "doviz,borsa");
    }

    #[test]
    fn flat_category_string_is_accepted() {
        let body = body(
            "ali@example.com",
            CategoryTokens::Flat(String::from("altin,doviz")),
            None,
            None,
        );

        let subscriber = assert_ok!(NewSubscriber::try_from(body));

        assert_eq!(subscriber.categories.len(), 2);
        assert_eq!(subscriber.notification_hour, super::DEFAULT_NOTIFICATION_HOUR);
        assert_eq!(subscriber.frequency, NotificationFrequency::Daily);
    }

    #[test]
    fn out_of_range_hour_is_rejected() {
        let body = body(
            "ali@example.com",
            CategoryTokens::Flat(String::from("doviz")),
            Some(24),
            None,
        );

        assert_err!(NewSubscriber::try_from(body));
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        let body = body(
            "ali@example.com",
            CategoryTokens::Flat(String::from("doviz")),
            Some(9),
            Some("hourly"),
        );

        assert_err!(NewSubscriber::try_from(body));
    }

    #[test]
    fn empty_categories_are_rejected() {
        let body = body("ali@example.com", CategoryTokens::List(vec![]), Some(9), None);

        assert_err!(NewSubscriber::try_from(body));
    }

    #[test]
    fn invalid_email_is_rejected() {
        let body = body(
            "not-an-email",
            CategoryTokens::Flat(String::from("doviz")),
            Some(9),
            None,
        );

        assert_err!(NewSubscriber::try_from(body));
    }
}
