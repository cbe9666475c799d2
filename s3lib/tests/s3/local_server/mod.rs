use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::put;
use base64::{Engine, engine::general_purpose};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

pub const ACCESS_KEY_ID: &str = "local-id";

type Store = Arc<Mutex<HashMap<String, Bytes>>>;

/// 一个只支持PUT/GET object的最小服务端，在随机端口上监听
pub async fn spawn() -> SocketAddr {
    let store: Store = Arc::default();
    let app = Router::new()
        .route("/{bucket}/{*key}", put(put_object).get(get_object))
        .with_state(store);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn error_response(status: StatusCode, code: &str) -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>{code}</Code>\
         <Message>{code}</Message><RequestId>local-request</RequestId>\
         <HostId>local-host</HostId></Error>"
    );
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(&format!("AWS {ACCESS_KEY_ID}:")))
}

async fn put_object(
    State(store): State<Store>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !authorized(&headers) {
        return error_response(StatusCode::FORBIDDEN, "AccessDenied");
    }
    let expected_md5 = general_purpose::STANDARD.encode(Md5::digest(&body));
    let content_md5 = headers.get("content-md5").and_then(|v| v.to_str().ok());
    if content_md5 != Some(expected_md5.as_str()) {
        return error_response(StatusCode::BAD_REQUEST, "BadDigest");
    }

    let e_tag = format!("\"{}\"", hex::encode(Md5::digest(&body)));
    store.lock().unwrap().insert(format!("{bucket}/{key}"), body);
    (StatusCode::OK, [(header::ETAG, e_tag)]).into_response()
}

async fn get_object(
    State(store): State<Store>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return error_response(StatusCode::FORBIDDEN, "AccessDenied");
    }
    let Some(body) = store.lock().unwrap().get(&format!("{bucket}/{key}")).cloned() else {
        return error_response(StatusCode::NOT_FOUND, "NoSuchKey");
    };

    let mut resp = body.clone().into_response();
    let resp_headers = resp.headers_mut();
    resp_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    if let Ok(e_tag) = HeaderValue::from_str(&format!("\"{}\"", hex::encode(Md5::digest(&body)))) {
        resp_headers.insert(header::ETAG, e_tag);
    }
    resp_headers.insert(
        header::LAST_MODIFIED,
        HeaderValue::from_static("Tue, 27 Mar 2007 19:36:42 GMT"),
    );
    resp
}
