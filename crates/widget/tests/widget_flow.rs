use std::cell::RefCell;
use std::rc::Rc;

use chatpane::chat::StreamOutcome;
use chatpane::settings::WidgetSettings;
use chatpane::surface::{ChipNode, ERROR_CLASS, HtmlSurface, PENDING_CLASS};
use chatpane::{ChatWidget, WidgetError};
use chatpane_client::{DocumentRef, UploadFile, create_backend};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn widget_for(server: &MockServer, settings: WidgetSettings) -> (Rc<RefCell<HtmlSurface>>, ChatWidget) {
    let settings = WidgetSettings {
        base_url: server.uri(),
        ..settings
    }
    .normalized();
    let backend = create_backend(settings.to_backend_config()).expect("backend");
    let surface = Rc::new(RefCell::new(HtmlSurface::new()));
    let widget = ChatWidget::new(backend, surface.clone(), &settings);
    (surface, widget)
}

async fn mount_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/upload-documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "documents": [
                {"id": "doc-b", "filename": "second.txt"},
                {"id": "doc-a", "filename": "first.txt"}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn two_files() -> Vec<UploadFile> {
    vec![
        UploadFile::new("first.txt", "alpha"),
        UploadFile::new("second.txt", "beta"),
    ]
}

#[tokio::test]
async fn uploaded_documents_become_chips_and_ride_along_with_chat() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(serde_json::json!({
            "message": "summarize",
            "documentIds": ["doc-b", "doc-a"],
            "stream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: Both files\n\ndata:  mention *tests*\n\ndata: [DONE]\n\n",
            "text/plain; charset=utf-8",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (surface, widget) = widget_for(&server, WidgetSettings::default());
    let added = widget.upload(two_files()).await.expect("upload");
    assert_eq!(
        added,
        vec![
            DocumentRef::new("doc-b", "second.txt"),
            DocumentRef::new("doc-a", "first.txt")
        ]
    );
    assert_eq!(
        surface.borrow().chips(),
        [
            ChipNode {
                document_id: "doc-b".to_string(),
                filename: "second.txt".to_string()
            },
            ChipNode {
                document_id: "doc-a".to_string(),
                filename: "first.txt".to_string()
            }
        ]
    );

    let outcome = widget.send("summarize").await.expect("send");
    assert_eq!(
        outcome,
        StreamOutcome::Completed {
            text: "Both files mention *tests*".to_string()
        }
    );

    let surface = surface.borrow();
    let reply = &surface.messages()[1];
    assert_eq!(reply.markup, "Both files mention <em>tests</em>");
    assert!(!reply.has_class(PENDING_CLASS));
}

#[tokio::test]
async fn deleting_unknown_document_changes_nothing() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (surface, widget) = widget_for(&server, WidgetSettings::default());
    widget.upload(two_files()).await.expect("upload");

    let removed = widget.delete_document("not-attached").await.expect("delete");
    assert!(!removed);
    assert_eq!(widget.documents().len(), 2);
    assert_eq!(surface.borrow().chips().len(), 2);
    assert!(surface.borrow().alerts().is_empty());
}

#[tokio::test]
async fn delete_removes_chip_only_when_server_confirms() {
    let server = MockServer::start().await;
    mount_upload(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/delete-document/doc-a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/delete-document/doc-b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (surface, widget) = widget_for(&server, WidgetSettings::default());
    widget.upload(two_files()).await.expect("upload");

    assert!(widget.delete_document("doc-a").await.expect("delete"));
    let error = widget
        .delete_document("doc-b")
        .await
        .expect_err("server refused");
    assert!(matches!(error, WidgetError::Client { .. }));

    assert_eq!(widget.documents(), vec![DocumentRef::new("doc-b", "second.txt")]);
    let surface = surface.borrow();
    assert_eq!(surface.chips().len(), 1);
    assert_eq!(surface.chips()[0].document_id, "doc-b");
    assert_eq!(surface.alerts().len(), 1);
    assert!(surface.alerts()[0].starts_with("Error deleting document"));
}

#[tokio::test]
async fn failed_upload_alerts_and_keeps_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload-documents"))
        .respond_with(ResponseTemplate::new(413))
        .mount(&server)
        .await;

    let (surface, widget) = widget_for(&server, WidgetSettings::default());
    let result = widget.upload(two_files()).await;

    assert!(result.is_err());
    assert!(widget.documents().is_empty());
    let surface = surface.borrow();
    assert!(surface.chips().is_empty());
    assert_eq!(
        surface.alerts(),
        ["Error uploading documents: server responded with status 413".to_string()]
    );
}

#[tokio::test]
async fn empty_upload_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_, widget) = widget_for(&server, WidgetSettings::default());
    assert!(widget.upload(Vec::new()).await.expect("upload").is_empty());
}

#[tokio::test]
async fn json_backend_replies_render_as_text_or_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(serde_json::json!({
            "message": "bad",
            "documentIds": [],
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "x"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(serde_json::json!({
            "message": "good",
            "documentIds": [],
            "stream": false
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"response": "**y**"})),
        )
        .mount(&server)
        .await;

    let settings = WidgetSettings {
        stream: false,
        ..WidgetSettings::default()
    };
    let (surface, widget) = widget_for(&server, settings);

    assert!(widget.send("bad").await.expect("send").is_failed());
    assert!(!widget.send("good").await.expect("send").is_failed());

    let surface = surface.borrow();
    let replies: Vec<_> = surface.messages().iter().skip(1).step_by(2).collect();
    assert_eq!(replies[0].markup, "Error: x");
    assert!(replies[0].has_class(ERROR_CLASS));
    assert_eq!(replies[1].markup, "<strong>y</strong>");
    assert!(!replies[1].has_class(ERROR_CLASS));
}

#[tokio::test]
async fn server_error_status_renders_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let (surface, widget) = widget_for(&server, WidgetSettings::default());
    let outcome = widget.send("hello").await.expect("send");

    assert_eq!(
        outcome,
        StreamOutcome::Failed {
            message: "server responded with status 502".to_string()
        }
    );
    let surface = surface.borrow();
    let reply = &surface.messages()[1];
    assert_eq!(reply.markup, "Error: server responded with status 502");
    assert!(reply.has_class(ERROR_CLASS));
    assert!(!reply.has_class(PENDING_CLASS));
    assert!(!widget.is_request_in_flight());
}
