mod local_server;

use mock_transport::*;
use reqwest::Method;
use s3lib::credentials::Credentials;
use s3lib::pipe::{FailureReason, UploadCoordinator, UploadError, UploadState};
use s3lib::s3::acl::CannedAcl;
use s3lib::s3::object::{MetaExt, PutObjectBody};
use s3lib::s3::{Client, ClientConfig, Error, ErrorKind};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_stream::StreamExt;

// region:    --- live config
#[derive(Deserialize, Debug)]
pub struct S3Config {
    pub credentials: Credentials,
    #[serde(default)]
    pub client: ClientConfig,
    pub bucket: String,
}

impl S3Config {
    pub fn get_conf() -> Self {
        let file_str = std::fs::read_to_string("tests/s3/config.toml").unwrap();
        toml::from_str(&file_str).unwrap()
    }
}

fn get_s3_client(conf: &S3Config) -> Client {
    Client::builder()
        .credentials(conf.credentials.clone())
        .config(conf.client.clone())
        .build()
        .unwrap()
}
// endregion: --- live config

// region:    --- executor
#[tokio::test]
async fn no_such_key_test() {
    let transport = MockTransport::new(|_| {
        Scripted::Respond(MockResponse::new(404).body(
            "<Error><Code>NoSuchKey</Code><Message>x</Message><RequestId>r1</RequestId><HostId>h1</HostId></Error>",
        ))
    });
    let client = client_with(transport.clone());

    let err = client.get_object("bucket-a", "missing.txt").await.unwrap_err();
    let service_error = err.as_service_error().unwrap();
    assert_eq!(service_error.kind, ErrorKind::NoSuchKey);
    assert_eq!(service_error.message, "x");
    assert_eq!(service_error.request_id.as_deref(), Some("r1"));
    assert_eq!(service_error.host_id.as_deref(), Some("h1"));
    assert_eq!(service_error.status, Some(404));
    assert_eq!(
        service_error.resource.as_deref(),
        Some("/bucket-a/missing.txt")
    );

    assert_eq!(transport.acquired(), 1);
    assert_eq!(transport.released(), 1);
}

#[tokio::test]
async fn missing_content_length_test() {
    let transport = MockTransport::new(|_| {
        Scripted::Respond(
            MockResponse::new(200)
                .header("ETag", "\"781e5e245d69b566979b86e28d23f2c7\"")
                .body("0123456789"),
        )
    });
    let client = client_with(transport.clone());

    let err = client.get_object("bucket-a", "a.txt").await.unwrap_err();
    match err {
        Error::ProtocolViolation { resource, reason } => {
            assert_eq!(resource, "/bucket-a/a.txt");
            assert!(reason.contains("Content-Length"));
        }
        e => panic!("unexpected error: {e:?}"),
    }
    assert_eq!(transport.released(), 1);
}

#[tokio::test]
async fn missing_etag_test() {
    let transport = MockTransport::new(|_| {
        Scripted::Respond(
            MockResponse::new(200)
                .header("Content-Length", "10")
                .body("0123456789"),
        )
    });
    let client = client_with(transport.clone());

    let err = client.head_object("bucket-a", "a.txt").await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation { .. }));
    assert_eq!(transport.released(), 1);
}

#[tokio::test]
async fn get_object_test() {
    let transport = MockTransport::new(|_| {
        Scripted::Respond(
            MockResponse::object("hello world")
                .header("Content-Type", "text/plain")
                .header("x-amz-meta-owner", "ops")
                .chunks(&["hello ", "world"]),
        )
    });
    let client = client_with(transport.clone());

    let output = client.get_object("bucket-a", "dir/a.txt").await.unwrap();
    assert_eq!(output.metadata.content_length, 11);
    assert_eq!(output.metadata.content_type.as_deref(), Some("text/plain"));
    assert_eq!(output.metadata.custom_metas["owner"], "ops");
    assert!(output.metadata.last_modified.is_some());
    // body还没有读，连接仍被占用
    assert_eq!(transport.released(), 0);

    let data = output.body.bytes().await.unwrap();
    assert_eq!(&data[..], b"hello world");
    assert_eq!(transport.released(), 1);

    let req = &transport.requests()[0];
    assert_eq!(req.method, Method::GET);
    assert_eq!(req.url.path(), "/bucket-a/dir/a.txt");
    assert!(
        req.header("authorization")
            .unwrap()
            .starts_with(&format!("AWS {ACCESS_KEY_ID}:"))
    );
    assert!(req.header("date").unwrap().ends_with(" GMT"));
}

#[tokio::test]
async fn response_body_release_once_test() {
    let transport = MockTransport::new(|_| Scripted::Respond(MockResponse::object("abc")));
    let client = client_with(transport.clone());

    // 关闭两次
    let mut output = client.get_object("bucket-a", "a").await.unwrap();
    output.body.close();
    output.body.close();
    drop(output);
    assert_eq!(transport.released(), 1);

    // 读到结尾再关闭
    let mut output = client.get_object("bucket-a", "a").await.unwrap();
    while let Some(chunk) = output.body.next().await {
        chunk.unwrap();
    }
    assert_eq!(transport.released(), 2);
    output.body.close();
    drop(output);
    assert_eq!(transport.released(), 2);

    // 不读直接drop
    let output = client.get_object("bucket-a", "a").await.unwrap();
    drop(output);
    assert_eq!(transport.released(), 3);
    assert_eq!(transport.acquired(), 3);
}

#[tokio::test]
async fn head_object_releases_immediately_test() {
    let transport = MockTransport::new(|_| Scripted::Respond(MockResponse::object("abc")));
    let client = client_with(transport.clone());

    let metadata = client.head_object("bucket-a", "a").await.unwrap();
    assert_eq!(metadata.content_length, 3);
    assert!(metadata.md5_digest().is_some());
    assert_eq!(transport.released(), 1);
    assert_eq!(transport.requests()[0].method, Method::HEAD);
}

#[tokio::test]
async fn empty_error_body_test() {
    let transport = MockTransport::new(|req| {
        if req.method == Method::DELETE {
            Scripted::Respond(MockResponse::new(503))
        } else {
            Scripted::Respond(MockResponse::new(500).body(""))
        }
    });
    let client = client_with(transport.clone());

    let err = client.delete_object("bucket-a", "a").await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation { .. }));
    let err = client.get_object("bucket-a", "a").await.unwrap_err();
    assert!(matches!(err, Error::ProtocolViolation { .. }));
    assert_eq!(transport.released(), 2);
}

#[tokio::test]
async fn truncated_error_body_test() {
    let transport = MockTransport::new(|_| {
        Scripted::Respond(MockResponse::new(502).body(vec![b'x'; 5000]))
    });
    let client = client_with(transport.clone());

    let err = client.get_object("bucket-a", "a").await.unwrap_err();
    let service_error = err.as_service_error().unwrap();
    assert_eq!(service_error.kind, ErrorKind::Unknown);
    assert_eq!(service_error.message.len(), 2048);
    assert_eq!(service_error.status, Some(502));
    assert_eq!(transport.released(), 1);
}

#[tokio::test]
async fn transport_error_test() {
    let transport = MockTransport::new(|_| Scripted::Fail("connection reset by peer"));
    let client = client_with(transport.clone());

    let err = client.get_object("bucket-a", "a").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "transport error on `/bucket-a/a`: connection reset by peer"
    );
    match err {
        Error::Transport { resource, source } => {
            assert_eq!(resource, "/bucket-a/a");
            assert_eq!(source.message(), "connection reset by peer");
        }
        e => panic!("unexpected error: {e:?}"),
    }
    assert_eq!(transport.acquired(), transport.released());
    // 不会重试
    assert_eq!(transport.requests().len(), 1);
}
// endregion: --- executor

// region:    --- object & bucket
#[tokio::test]
async fn put_object_test() {
    let transport = MockTransport::object_store();
    let client = client_with(transport.clone());

    let res = client
        .put_object()
        .content_type("text/plain")
        .cache_control("max-age=60")
        .x_meta("Owner", "ops")
        .x_metas([("team", "storage")])
        .build()
        .send("bucket-a", "dir/a.txt", PutObjectBody::Bytes("0123456789".into()))
        .await
        .unwrap();
    assert_eq!(res.e_tag.as_deref(), Some("\"etag\""));

    let req = &transport.requests()[0];
    assert_eq!(req.method, Method::PUT);
    assert_eq!(req.url.path(), "/bucket-a/dir/a.txt");
    assert_eq!(req.header("x-amz-acl"), Some("private"));
    assert_eq!(req.header("content-md5"), Some("eB5eJF1ptWaXm4bijSPyxw=="));
    assert_eq!(req.header("content-type"), Some("text/plain"));
    assert_eq!(req.header("cache-control"), Some("max-age=60"));
    assert_eq!(req.header("x-amz-meta-owner"), Some("ops"));
    assert_eq!(req.header("x-amz-meta-team"), Some("storage"));
    assert_eq!(&req.body[..], b"0123456789");
    assert_eq!(transport.released(), 1);
}

#[tokio::test]
async fn put_object_from_file_test() {
    let transport = MockTransport::object_store();
    let client = client_with(transport.clone());

    let path = std::env::temp_dir().join("s3lib_put_object_from_file_test.txt");
    tokio::fs::write(&path, b"0123456789").await.unwrap();
    let res = client
        .put_object()
        .acl(CannedAcl::PublicRead)
        .build()
        .send("bucket-a", "file.txt", PutObjectBody::FilePath(&path))
        .await;
    let _ = tokio::fs::remove_file(&path).await;
    res.unwrap();

    let req = &transport.requests()[0];
    assert_eq!(req.header("x-amz-acl"), Some("public-read"));
    assert_eq!(req.header("content-md5"), Some("eB5eJF1ptWaXm4bijSPyxw=="));
    assert_eq!(req.header("content-length"), Some("10"));
    assert_eq!(&req.body[..], b"0123456789");
}

#[tokio::test]
async fn invalid_names_test() {
    let transport = MockTransport::object_store();
    let client = client_with(transport.clone());

    let err = client.get_object("Bad_Bucket", "a").await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    let err = client.delete_object("bucket-a", "").await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn list_objects_test() {
    let transport = MockTransport::new(|_| {
        Scripted::Respond(MockResponse::new(200).body(
            r#"<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket-a</Name>
  <Prefix>logs/</Prefix>
  <Marker/>
  <MaxKeys>1</MaxKeys>
  <Delimiter>/</Delimiter>
  <IsTruncated>true</IsTruncated>
  <NextMarker>logs/a.log</NextMarker>
  <Contents>
    <Key>logs/a.log</Key>
    <LastModified>2024-03-01T08:30:00.000Z</LastModified>
    <ETag>"781e5e245d69b566979b86e28d23f2c7"</ETag>
    <Size>10</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <CommonPrefixes><Prefix>logs/2024/</Prefix></CommonPrefixes>
</ListBucketResult>"#,
        ))
    });
    let client = client_with(transport.clone());

    let listing = client
        .list_objects("bucket-a")
        .prefix("logs/")
        .delimiter("/")
        .max_keys(1)
        .build()
        .send()
        .await
        .unwrap();
    assert_eq!(listing.bucket_name, "bucket-a");
    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.entries[0].key, "logs/a.log");
    assert!(listing.common_prefixes.contains("logs/2024/"));
    assert_eq!(listing.next_page_marker(), Some("logs/a.log"));

    let req = &transport.requests()[0];
    assert_eq!(req.url.path(), "/bucket-a/");
    assert_eq!(req.url.query(), Some("delimiter=%2F&max-keys=1&prefix=logs%2F"));
    assert_eq!(transport.released(), 1);
}

#[tokio::test]
async fn bucket_test() {
    let transport = MockTransport::new(|req| match req.method {
        Method::PUT => Scripted::Respond(MockResponse::new(200)),
        _ => Scripted::Respond(MockResponse::error(409, "BucketNotEmpty", "r-409")),
    });
    let client = client_with(transport.clone());

    client
        .create_bucket("bucket-a", CannedAcl::Private)
        .await
        .unwrap();
    let err = client.delete_bucket("bucket-a").await.unwrap_err();
    let service_error = err.as_service_error().unwrap();
    assert_eq!(service_error.kind, ErrorKind::BucketNotEmpty);
    assert_eq!(service_error.request_id.as_deref(), Some("r-409"));

    let requests = transport.requests();
    assert_eq!(requests[0].url.path(), "/bucket-a/");
    assert_eq!(requests[0].header("x-amz-acl"), Some("private"));
    assert_eq!(transport.released(), 2);
}
// endregion: --- object & bucket

// region:    --- upload pipeline
fn coordinator(client: Client, block_size: usize, queue_capacity: usize) -> UploadCoordinator {
    UploadCoordinator::builder()
        .client(client)
        .bucket("backups")
        .block_size(block_size)
        .queue_capacity(queue_capacity)
        .build()
        .unwrap()
}

#[tokio::test]
async fn upload_round_trip_test() {
    let transport = MockTransport::object_store();
    let mut coordinator = coordinator(client_with(transport.clone()), 4, 2);

    // 5个block，最后一个只有1个字节
    let data: Vec<u8> = (0u8..17).collect();
    let source: &'static [u8] = Box::leak(data.clone().into_boxed_slice());
    let summary = coordinator.upload("stream", source).await.unwrap();
    assert_eq!(summary.blocks, 5);
    assert_eq!(summary.bytes, 17);
    assert_eq!(coordinator.state(), &UploadState::Succeeded);

    let requests = transport.requests();
    let keys: Vec<_> = requests.iter().map(|r| r.key()).collect();
    assert_eq!(
        keys,
        ["stream.0", "stream.1", "stream.2", "stream.3", "stream.4"]
    );
    assert_eq!(requests[4].body.len(), 1);
    assert!(requests.iter().all(|r| r.header("x-amz-acl") == Some("private")));
    let uploaded: Vec<u8> = requests.iter().flat_map(|r| r.body.to_vec()).collect();
    assert_eq!(uploaded, data);
    assert_eq!(transport.released(), 5);
}

#[tokio::test]
async fn upload_failure_stops_producer_test() {
    let transport = MockTransport::new(|req| {
        if req.key() == "stream.2" {
            Scripted::Respond(MockResponse::error(500, "InternalError", "r-500"))
        } else {
            Scripted::Respond(MockResponse::new(200))
        }
    });
    let mut coordinator = coordinator(client_with(transport.clone()), 4, 1);

    let data: &'static [u8] = &[1u8; 4000];
    let (source, read) = CountingReader::new(data);
    let err = coordinator.upload("stream", source).await.unwrap_err();
    match &err {
        UploadError::Block { sequence, key, .. } => {
            assert_eq!(*sequence, 2);
            assert_eq!(key, "stream.2");
        }
        e => panic!("unexpected error: {e:?}"),
    }
    let service_error = err.service_error().unwrap();
    assert_eq!(service_error.kind, ErrorKind::InternalError);
    assert_eq!(service_error.request_id.as_deref(), Some("r-500"));

    assert_eq!(
        coordinator.state(),
        &UploadState::Failed(FailureReason::Upload { sequence: 2 })
    );
    // 失败之后没有再上传
    assert_eq!(transport.requests().len(), 3);
    // 最多多读一个排队的block和一个等待入队的block
    assert!(read.load(Ordering::SeqCst) <= 5 * 4);
}

#[tokio::test]
async fn upload_source_error_test() {
    let transport = MockTransport::object_store();
    let mut coordinator = coordinator(client_with(transport.clone()), 4, 4);

    let source = tokio_test::io::Builder::new()
        .read(b"abcd")
        .read(b"efgh")
        .read_error(std::io::Error::other("disk failure"))
        .build();
    let err = coordinator.upload("stream", source).await.unwrap_err();
    assert!(matches!(err, UploadError::SourceRead(_)));
    assert_eq!(
        coordinator.state(),
        &UploadState::Failed(FailureReason::SourceRead)
    );
    // 读取出错前的block都已经上传
    let keys: Vec<_> = transport.requests().iter().map(|r| r.key()).collect();
    assert_eq!(keys, ["stream.0", "stream.1"]);
}

#[tokio::test]
async fn upload_reuse_test() {
    let transport = MockTransport::new(|req| {
        if req.key() == "first.1" {
            Scripted::Fail("connection refused")
        } else {
            Scripted::Respond(MockResponse::new(200))
        }
    });
    let mut coordinator = coordinator(client_with(transport.clone()), 2, 1);

    let source: &'static [u8] = b"abcdef";
    let err = coordinator.upload("first", source).await.unwrap_err();
    match err {
        UploadError::Block { sequence, source, .. } => {
            assert_eq!(sequence, 1);
            assert!(
                matches!(source, Error::Transport { ref resource, .. } if resource == "/backups/first.1")
            );
        }
        e => panic!("unexpected error: {e:?}"),
    }
    assert_eq!(
        coordinator.state(),
        &UploadState::Failed(FailureReason::Upload { sequence: 1 })
    );

    let summary = coordinator.upload("second", source).await.unwrap();
    assert_eq!(summary.blocks, 3);
    assert_eq!(coordinator.state(), &UploadState::Succeeded);
}

#[tokio::test]
async fn upload_empty_source_test() {
    let transport = MockTransport::object_store();
    let mut coordinator = coordinator(client_with(transport.clone()), 4, 4);

    let source: &'static [u8] = b"";
    let summary = coordinator.upload("empty", source).await.unwrap();
    assert_eq!(summary.blocks, 0);
    assert_eq!(summary.bytes, 0);
    assert_eq!(coordinator.state(), &UploadState::Succeeded);
    assert!(transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn upload_dropped_test() {
    let transport = MockTransport::new(|_| Scripted::Hang);
    let mut coordinator = coordinator(client_with(transport.clone()), 4, 1);

    let data: &'static [u8] = &[1u8; 4000];
    let (source, read) = CountingReader::new(data);
    let res = tokio::time::timeout(
        Duration::from_millis(100),
        coordinator.upload("stream", source),
    )
    .await;
    assert!(res.is_err());
    assert_eq!(
        coordinator.state(),
        &UploadState::Failed(FailureReason::Cancelled)
    );

    let read_at_cancel = read.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(read.load(Ordering::SeqCst), read_at_cancel);
    assert!(read_at_cancel <= 3 * 4);
}
// endregion: --- upload pipeline

// region:    --- local server
#[tokio::test]
async fn local_server_test() {
    let addr = local_server::spawn().await;
    let client = Client::builder()
        .credentials(Credentials::new(
            local_server::ACCESS_KEY_ID,
            "local-secret",
        ))
        .config(
            ClientConfig::builder()
                .endpoint(format!("http://{addr}"))
                .timeout_secs(10)
                .build(),
        )
        .build()
        .unwrap();

    client
        .put_object()
        .content_type("text/plain")
        .build()
        .send("bucket-a", "dir/a b.txt", PutObjectBody::Bytes("0123456789".into()))
        .await
        .unwrap();

    let output = client.get_object("bucket-a", "dir/a b.txt").await.unwrap();
    assert_eq!(output.metadata.content_length, 10);
    assert_eq!(
        output.metadata.md5_digest().map(hex::encode).as_deref(),
        Some("781e5e245d69b566979b86e28d23f2c7")
    );
    assert_eq!(&output.body.bytes().await.unwrap()[..], b"0123456789");

    let err = client.get_object("bucket-a", "missing").await.unwrap_err();
    let service_error = err.as_service_error().unwrap();
    assert_eq!(service_error.kind, ErrorKind::NoSuchKey);
    assert_eq!(service_error.status, Some(404));

    // 分块上传
    let mut coordinator = UploadCoordinator::builder()
        .client(client.clone())
        .bucket("bucket-a")
        .block_size(3)
        .build()
        .unwrap();
    let source: &'static [u8] = b"abcdefgh";
    let summary = coordinator.upload("piped", source).await.unwrap();
    assert_eq!(summary.blocks, 3);
    let last = client.get_object("bucket-a", "piped.2").await.unwrap();
    assert_eq!(&last.body.bytes().await.unwrap()[..], b"gh");
}

#[tokio::test]
async fn unreachable_server_test() {
    let client = Client::builder()
        .credentials(Credentials::new("id", "secret"))
        .config(
            ClientConfig::builder()
                .endpoint("http://127.0.0.1:1")
                .connect_timeout_secs(2)
                .build(),
        )
        .build()
        .unwrap();
    let err = client.head_object("bucket-a", "a").await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
}
// endregion: --- local server

#[tokio::test]
#[ignore = "needs tests/s3/config.toml and a reachable service"]
async fn live_round_trip_test() {
    let conf = S3Config::get_conf();
    let client = get_s3_client(&conf);

    let res = client
        .put_object()
        .content_type("text/plain")
        .x_meta("source", "s3lib-test")
        .build()
        .send(
            &conf.bucket,
            "s3lib-test/sample.txt",
            PutObjectBody::Bytes("hello".into()),
        )
        .await;
    match &res {
        Ok(h) => println!("[success]\n{:#?}", h),
        Err(e) => println!("[error]\n{:#?}", e),
    }
    res.unwrap();

    let metadata = client
        .head_object(&conf.bucket, "s3lib-test/sample.txt")
        .await
        .unwrap();
    assert_eq!(metadata.content_length, 5);
    assert_eq!(metadata.custom_metas["source"], "s3lib-test");

    let listing = client
        .list_objects(&conf.bucket)
        .prefix("s3lib-test/")
        .build()
        .send()
        .await
        .unwrap();
    println!("{:#?}", listing);

    client
        .delete_object(&conf.bucket, "s3lib-test/sample.txt")
        .await
        .unwrap();
}
