//! src/campaign/personalize.rs

use crate::campaign::ArticleContent;
use crate::domain::Subscriber;
use reqwest::Url;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// Named fields the provider substitutes into the campaign template.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TemplateFields {
    pub subject: String,
    pub title: String,
    pub preview: String,
    pub link: String,
    pub unsubscribe: String,
}

/// Everything needed to send the campaign email to exactly one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePayload {
    pub template_id: String,
    pub recipient: Recipient,
    pub fields: TemplateFields,
}

#[derive(Debug, Clone)]
pub struct Personalizer {
    template_id: String,
    unsubscribe_url: Url,
}

impl Personalizer {
    pub fn new(template_id: String, unsubscribe_url: &str) -> Result<Self, anyhow::Error> {
        let unsubscribe_url = Url::parse(unsubscribe_url)
            .map_err(|e| anyhow::anyhow!("`{}` is not a valid unsubscribe url: {}", unsubscribe_url, e))?;
        if unsubscribe_url.cannot_be_a_base() {
            anyhow::bail!("`{}` cannot carry query parameters.", unsubscribe_url);
        }
        Ok(Self {
            template_id,
            unsubscribe_url,
        })
    }

    /// Builds a fresh payload for `subscriber`. Nothing is shared between
    /// two calls apart from the article content itself.
    pub fn personalize(
        &self,
        content: &ArticleContent,
        subscriber: &Subscriber,
        campaign_link: &str,
    ) -> MessagePayload {
        MessagePayload {
            template_id: self.template_id.clone(),
            recipient: Recipient {
                name: subscriber.name.clone(),
                email: subscriber.email.clone(),
            },
            fields: TemplateFields {
                subject: content.title.clone(),
                title: content.title.clone(),
                preview: content.preview.clone(),
                link: campaign_link.to_string(),
                unsubscribe: self.unsubscribe_link(subscriber.id),
            },
        }
    }

    fn unsubscribe_link(&self, subscriber_id: Uuid) -> String {
        let mut link = self.unsubscribe_url.clone();
        link.query_pairs_mut()
            .append_pair("id", &subscriber_id.to_string());
        link.into()
    }
}
