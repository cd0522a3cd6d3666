/// How many digests a subscriber receives per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFrequency {
    Daily,
    Twice,
    ThreeTimes,
}

impl NotificationFrequency {
    /// Parses a persisted frequency token. Rows written before the token
    /// set was fixed may hold arbitrary values; callers deciding schedule
    /// eligibility treat a parse failure as "hour match only".
    pub fn parse(token: &str) -> Result<NotificationFrequency, String> {
        match token.trim().to_lowercase().as_str() {
            "daily" => Ok(NotificationFrequency::Daily),
            "twice" => Ok(NotificationFrequency::Twice),
            "three_times" => Ok(NotificationFrequency::ThreeTimes),
            other => Err(format!("{} is not a valid notification frequency", other)),
        }
    }
}

impl AsRef<str> for NotificationFrequency {
    fn as_ref(&self) -> &str {
        match self {
            NotificationFrequency::Daily => "daily",
            NotificationFrequency::Twice => "twice",
            NotificationFrequency::ThreeTimes => "three_times",
        }
    }
}
