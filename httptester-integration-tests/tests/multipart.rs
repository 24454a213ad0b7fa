use bytes::Bytes;
use httptester::{eyre, Method};
use httptester_integration_tests::client;
use mockito::Matcher;

fn upload_matchers() -> Vec<Matcher> {
    vec![
        Matcher::Regex(r#"name="Image.FileName"\r\n\r\nnote.txt"#.into()),
        Matcher::Regex(r#"name="Image.FileContent"; filename="note.txt""#.into()),
        Matcher::Regex("(?i)content-type: text/plain".into()),
        Matcher::Regex("hello multipart".into()),
    ]
}

#[tokio::test]
async fn multipart_upload() -> eyre::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/bicycles/1/image")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".into()),
        )
        .match_body(Matcher::AllOf(upload_matchers()))
        .with_status(200)
        .create_async()
        .await;

    let mut client = client(&server.url())?;
    let response = client
        .with_path("/api/bicycles/1/image")
        .with_multipart_field("Image.FileName", "note.txt")?
        .with_multipart_file(Bytes::from_static(b"hello multipart"), "Image.FileContent", "note.txt")?
        .with_method(Method::POST)
        .start()
        .await?;

    mock.assert_async().await;
    assert!(response.is_success());
    Ok(())
}

#[tokio::test]
async fn multipart_body_is_resent_on_repeat() -> eyre::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/upload")
        .match_body(Matcher::AllOf(upload_matchers()))
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let mut client = client(&server.url())?;
    client
        .with_path("/api/upload")
        .with_multipart_field("Image.FileName", "note.txt")?
        .with_multipart_file(b"hello multipart".to_vec(), "Image.FileContent", "note.txt")?
        .with_method(Method::POST);

    client.start().await?;
    client.start().await?;

    mock.assert_async().await;
    Ok(())
}
