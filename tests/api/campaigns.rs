//! tests/api/campaigns.rs

use crate::helpers::{spawn_app, ARTICLE_PATH};
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, Request, ResponseTemplate};

/// Matches send requests addressed to one recipient.
struct RecipientIs(String);

impl wiremock::Match for RecipientIs {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<serde_json::Value>(&request.body)
            .map(|body| body["personalizations"][0]["to"][0]["email"] == self.0.as_str())
            .unwrap_or(false)
    }
}

async fn accept_all_sends(server: &wiremock::MockServer) {
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

#[tokio::test]
async fn a_wrong_passcode_is_rejected_with_a_401_and_contacts_nobody() {
    // Arrange
    let test_app = spawn_app().await;
    test_app.insert_subscriber("le guin", "ursula_le_guin@gmail.com", true).await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.content_server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&test_app.email_server)
        .await;
    let test_cases = vec![
        (
            serde_json::json!({ "link": test_app.article_link(), "passcode": "wrong" }),
            "wrong passcode",
        ),
        (
            serde_json::json!({ "link": test_app.article_link() }),
            "missing passcode",
        ),
        (serde_json::json!({}), "empty body"),
    ];

    for (body, description) in test_cases {
        // Act
        let response = test_app.post_campaign(&body).await;

        // Assert
        assert_eq!(
            401,
            response.status().as_u16(),
            "The API did not return a 401 Unauthorized for {}.",
            description
        );
    }
}

#[tokio::test]
async fn an_invalid_link_is_rejected_with_a_400() {
    // Arrange
    let test_app = spawn_app().await;
    let test_cases = vec![
        ("", "empty link"),
        ("not a link", "malformed link"),
        ("ftp://example.com/post", "non http link"),
    ];

    for (link, description) in test_cases {
        // Act
        let response = test_app
            .post_campaign(&serde_json::json!({ "link": link, "passcode": test_app.passcode }))
            .await;

        // Assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not return a 400 Bad Request for {}.",
            description
        );
    }
}

#[tokio::test]
async fn a_campaign_reaches_every_active_subscriber() {
    // Arrange
    let test_app = spawn_app().await;
    let ursula = test_app.insert_subscriber("Ursula", "ursula_le_guin@gmail.com", true).await;
    test_app.insert_subscriber("Terry", "terry@example.com", true).await;
    test_app.insert_subscriber("Gone", "gone@example.com", false).await;
    test_app
        .serve_article("On dogs", "Dogs are good. Cats are fine. The end.")
        .await;
    test_app.allow_batch_id("batch-42").await;
    Mock::given(method("POST"))
        .and(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(2)
        .mount(&test_app.email_server)
        .await;

    // Act
    let response = test_app.post_campaign(&test_app.campaign_body()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "Delivered 2 of 2 emails (0 failed)."
    );

    let sent = test_app.sent_emails().await;
    assert_eq!(sent.len(), 2);
    for body in &sent {
        assert_eq!(body["batch_id"], "batch-42");
        let fields = &body["personalizations"][0]["dynamic_template_data"];
        assert_eq!(fields["subject"], "On dogs");
        assert_eq!(fields["title"], "On dogs");
        assert_eq!(fields["preview"], "Dogs are good");
        assert_eq!(fields["link"], test_app.article_link().as_str());
    }
    let to_ursula = sent
        .iter()
        .find(|b| b["personalizations"][0]["to"][0]["email"] == "ursula_le_guin@gmail.com")
        .expect("No email was sent to Ursula.");
    assert_eq!(to_ursula["personalizations"][0]["to"][0]["name"], "Ursula");
    let unsubscribe = to_ursula["personalizations"][0]["dynamic_template_data"]["unsubscribe"]
        .as_str()
        .unwrap();
    assert!(unsubscribe.ends_with(&format!("/subscriptions/unsubscribe?id={}", ursula)));
}

#[tokio::test]
async fn rejected_sends_are_counted_and_the_rest_are_delivered() {
    // Arrange
    let test_app = spawn_app().await;
    test_app.insert_subscriber("Ursula", "ursula_le_guin@gmail.com", true).await;
    test_app.insert_subscriber("Terry", "terry@example.com", true).await;
    test_app.insert_subscriber("Iain", "iain@example.com", true).await;
    test_app.serve_article("On dogs", "Dogs are good. The end.").await;
    test_app.allow_batch_id("batch-42").await;
    Mock::given(path("/v3/mail/send"))
        .and(RecipientIs("terry@example.com".into()))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad recipient"))
        .with_priority(1)
        .expect(1)
        .mount(&test_app.email_server)
        .await;
    accept_all_sends(&test_app.email_server).await;

    // Act
    let response = test_app.post_campaign(&test_app.campaign_body()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "Delivered 2 of 3 emails (1 failed)."
    );
    assert_eq!(test_app.sent_emails().await.len(), 3);
}

#[tokio::test]
async fn an_unreachable_page_is_reported_as_a_502() {
    // Arrange
    let test_app = spawn_app().await;
    test_app.insert_subscriber("Ursula", "ursula_le_guin@gmail.com", true).await;
    Mock::given(path(ARTICLE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&test_app.content_server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    // Act
    let response = test_app.post_campaign(&test_app.campaign_body()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 502);
}

#[tokio::test]
async fn a_page_without_a_sentence_boundary_is_reported_as_a_500() {
    // Arrange
    let test_app = spawn_app().await;
    test_app.insert_subscriber("Ursula", "ursula_le_guin@gmail.com", true).await;
    test_app.serve_article("On dogs", "Dogs are good").await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    // Act
    let response = test_app.post_campaign(&test_app.campaign_body()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 500);
}

#[tokio::test]
async fn a_batch_id_failure_still_delivers_every_email() {
    // Arrange
    let test_app = spawn_app().await;
    test_app.insert_subscriber("Ursula", "ursula_le_guin@gmail.com", true).await;
    test_app.insert_subscriber("Terry", "terry@example.com", true).await;
    test_app.serve_article("On dogs", "Dogs are good. The end.").await;
    Mock::given(path("/v3/mail/batch"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&test_app.email_server)
        .await;
    accept_all_sends(&test_app.email_server).await;

    // Act
    let response = test_app.post_campaign(&test_app.campaign_body()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let sent = test_app.sent_emails().await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|body| body.get("batch_id").is_none()));
}

#[tokio::test]
async fn rejected_provider_credentials_halt_the_campaign_with_a_502() {
    // Arrange
    let test_app = spawn_app().await;
    for i in 0..3 {
        test_app
            .insert_subscriber("Reader", &format!("reader{}@example.com", i), true)
            .await;
    }
    test_app.serve_article("On dogs", "Dogs are good. The end.").await;
    test_app.allow_batch_id("batch-42").await;
    Mock::given(path("/v3/mail/send"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&test_app.email_server)
        .await;

    // Act
    let response = test_app.post_campaign(&test_app.campaign_body()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 502);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("Delivered 0 of 3 emails (3 failed)."), "{}", body);
    assert!(body.contains("Stopped early"));
}

#[tokio::test]
async fn a_campaign_without_subscribers_succeeds_without_sending() {
    // Arrange
    let test_app = spawn_app().await;
    test_app.serve_article("On dogs", "Dogs are good. The end.").await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    // Act
    let response = test_app.post_campaign(&test_app.campaign_body()).await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.text().await.unwrap(),
        "Delivered 0 of 0 emails (0 failed)."
    );
}
