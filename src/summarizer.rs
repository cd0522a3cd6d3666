use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};

use crate::domain::category::Category;
use crate::sources::NewsItem;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_BACKOFF: Duration = Duration::from_secs(2);
const MAX_ATTEMPTS: u32 = 3;

/// Client for the external summarization collaborator (an OpenAI-style
/// chat-completions API).
///
/// `summarize` never fails from the caller's point of view: transient
/// rate limits are retried with a linear backoff and anything else
/// collapses into a deterministic Turkish fallback sentence, so a broken
/// summarizer can degrade a digest but never block it.
pub struct SummarizerClient {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
    model: String,
    retry_backoff: Duration,
}

#[derive(serde::Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl SummarizerClient {
    pub fn new(
        base_url: String,
        api_key: Secret<String>,
        model: String,
        timeout: Option<Duration>,
        retry_backoff: Option<Duration>,
    ) -> SummarizerClient {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()
            .expect("Failed to build the summarizer HTTP client");

        SummarizerClient {
            http_client,
            base_url,
            api_key,
            model,
            retry_backoff: retry_backoff.unwrap_or(RETRY_BACKOFF),
        }
    }

    #[tracing::instrument(name = "Summarizing category news", skip(self, items), fields(count = items.len()))]
    pub async fn summarize(&self, items: &[NewsItem], category: Category) -> String {
        if items.is_empty() {
            return no_news_text(category);
        }

        let prompt = build_prompt(items, category);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.request_completion(&prompt).await {
                Ok(summary) if !summary.is_empty() => {
                    tracing::info!(%category, attempt, "summary generated");
                    return summary;
                }
                Ok(_) => {
                    tracing::warn!(%category, attempt, "summarizer returned an empty completion");
                    break;
                }
                Err(error) => {
                    let rate_limited = error
                        .status()
                        .map(|status| status == StatusCode::TOO_MANY_REQUESTS)
                        .unwrap_or(false);

                    if rate_limited && attempt < MAX_ATTEMPTS {
                        let backoff = self.retry_backoff * attempt;
                        tracing::warn!(%category, attempt, ?backoff, "summarizer rate limited, retrying");
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    tracing::error!(%category, attempt, %error, "summarizer request failed");
                    break;
                }
            }
        }

        unavailable_text(category, items.len())
    }

    async fn request_completion(&self, prompt: &str) -> Result<String, reqwest::Error> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
            max_tokens: 500,
        };

        let response: ChatCompletionResponse = self
            .http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default())
    }
}

fn build_prompt(items: &[NewsItem], category: Category) -> String {
    let titles = items
        .iter()
        .enumerate()
        .map(|(index, item)| format!("{}. {}", index + 1, item.title))
        .collect::<Vec<_>>()
        .join("\n");

    let focus = match category {
        Category::Doviz => "döviz kurları, para birimleri, TCMB, faiz oranları ve enflasyon",
        Category::Altin => "altın fiyatları, gram altın, çeyrek altın ve değerli metaller",
        Category::Borsa => "Borsa İstanbul (BIST), hisse senetleri, endeksler ve şirket haberleri",
    };

    format!(
        "Sen bir finans editörüsün. Aşağıdaki {} haberlerini Türkçe olarak kısa ve öz bir şekilde özetle.\n\n\
         KURALLAR:\n\
         - Maksimum 3-4 KISA cümle yaz\n\
         - Haberlerin ana konularını özetle\n\
         - Sayıları ve yüzdeleri kullan (örn: \"yüzde 0.3 arttı\")\n\
         - Profesyonel ve anlaşılır dil kullan\n\
         - {} odaklı haber özeti oluştur\n\n\
         Haberler:\n{}\n\nKısa Özet:",
        category.display_name(),
        focus,
        titles
    )
}

/// Deterministic text for a category with no current news.
pub fn no_news_text(category: Category) -> String {
    format!(
        "{} kategorisinde henüz haber bulunmamaktadır.",
        category.display_name()
    )
}

/// Deterministic text when summarization is exhausted.
pub fn unavailable_text(category: Category, item_count: usize) -> String {
    format!(
        "{} kategorisinde {} haber bulundu ancak özet oluşturulamadı.",
        category.display_name(),
        item_count
    )
}

#[cfg(test)]
mod tests {
    use super::{no_news_text, unavailable_text, SummarizerClient};
    use crate::domain::category::Category;
    use crate::sources::NewsItem;
    use fake::{Fake, Faker};
    use secrecy::Secret;
    use std::time::Duration;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn items(count: usize) -> Vec<NewsItem> {
        (0..count)
            .map(|i| NewsItem {
                title: format!("Haber {}", i),
                url: format!("https://example.com/{}", i),
                snippet: String::new(),
                category: Category::Doviz,
                published_at: None,
            })
            .collect()
    }

    fn client(base_url: String) -> SummarizerClient {
        SummarizerClient::new(
            base_url,
            Secret::new(Faker.fake()),
            String::from("llama-3.3-70b-versatile"),
            Some(Duration::from_millis(500)),
            Some(Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn summarize_returns_the_completion_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "Dolar yüzde 0.3 arttı."}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let summary = client(mock_server.uri())
            .summarize(&items(3), Category::Doviz)
            .await;

        assert_eq!(summary, "Dolar yüzde 0.3 arttı.");
    }

    #[tokio::test]
    async fn empty_input_short_circuits_without_a_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let summary = client(mock_server.uri())
            .summarize(&[], Category::Altin)
            .await;

        assert_eq!(summary, no_news_text(Category::Altin));
    }

    #[tokio::test]
    async fn server_error_yields_the_fallback_sentence() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let summary = client(mock_server.uri())
            .summarize(&items(4), Category::Borsa)
            .await;

        assert_eq!(summary, unavailable_text(Category::Borsa, 4));
    }

    #[tokio::test]
    async fn rate_limit_is_retried_until_exhaustion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&mock_server)
            .await;

        let summary = client(mock_server.uri())
            .summarize(&items(2), Category::Doviz)
            .await;

        assert_eq!(summary, unavailable_text(Category::Doviz, 2));
    }

    #[tokio::test]
    async fn fallback_sentences_are_deterministic() {
        assert_eq!(
            no_news_text(Category::Borsa),
            "Borsa kategorisinde henüz haber bulunmamaktadır."
        );
        assert_eq!(
            unavailable_text(Category::Altin, 5),
            "Altın kategorisinde 5 haber bulundu ancak özet oluşturulamadı."
        );
    }
}
