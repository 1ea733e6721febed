//! Tests for the payment gateway adapters.

use super::*;
use crate::config::{AlipayConfig, WechatConfig};
use crate::domain::PaymentStatus;
use std::str::FromStr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

const WECHAT_KEY: &str = "wechat-test-key";
const ALIPAY_SECRET: &str = "alipay-test-secret";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn wechat_config(gateway_url: Option<String>) -> WechatConfig {
    WechatConfig {
        enabled: true,
        app_id: "wx123".into(),
        mch_id: "1900000001".into(),
        notify_url: "https://shop.example.com/notify/wechat".into(),
        gateway_url,
        api_key: WECHAT_KEY.into(),
    }
}

fn alipay_config() -> AlipayConfig {
    AlipayConfig {
        enabled: true,
        app_id: "2021000000".into(),
        notify_url: "https://shop.example.com/notify/alipay".into(),
        return_url: Some("https://shop.example.com/orders".into()),
        gateway_url: Some("https://openapi.alipaydev.com/gateway.do".into()),
        app_secret: ALIPAY_SECRET.into(),
    }
}

fn wechat_callback(payment_id: i64, result_code: &str) -> CallbackFields {
    let mut fields = CallbackFields::new();
    fields.insert("appid".into(), "wx123".into());
    fields.insert("mch_id".into(), "1900000001".into());
    fields.insert("out_trade_no".into(), "ORD20240101120000042".into());
    fields.insert("attach".into(), payment_id.to_string());
    fields.insert("transaction_id".into(), "4200000001".into());
    fields.insert("result_code".into(), result_code.into());
    fields.insert("total_fee".into(), "2500".into());
    fields.insert("nonce_str".into(), "abc123".into());
    let sign = sign_wechat_fields(WECHAT_KEY, &fields);
    fields.insert("sign".into(), sign);
    fields
}

fn alipay_callback(payment_id: i64, trade_status: &str) -> CallbackFields {
    let mut fields = CallbackFields::new();
    fields.insert("app_id".into(), "2021000000".into());
    fields.insert("out_trade_no".into(), "ORD20240101120000042".into());
    fields.insert("passback_params".into(), payment_id.to_string());
    fields.insert("trade_no".into(), "2024010122001".into());
    fields.insert("trade_status".into(), trade_status.into());
    fields.insert("total_amount".into(), "25.00".into());
    fields.insert("sign_type".into(), "HMAC-SHA256".into());
    let sign = sign_alipay_fields(ALIPAY_SECRET, &fields);
    fields.insert("sign".into(), sign);
    fields
}

/// Serves exactly one HTTP request with the given status and body, and hands
/// the raw request text back through the returned channel.
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
    });

    (format!("http://{}", addr), rx)
}

// ==================== WeChat tests ====================

#[tokio::test]
async fn test_wechat_create_payment_returns_code_url() {
    let (url, request) = serve_once("200 OK", r#"{"code_url":"weixin://wxpay/bizpayurl?pr=abc"}"#).await;
    let gateway = WechatGateway::new(&wechat_config(Some(url)), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let code_url = gateway
        .create_payment(17, dec("25.00"), "ORD20240101120000042")
        .await
        .unwrap();
    assert_eq!(code_url, "weixin://wxpay/bizpayurl?pr=abc");

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /v3/pay/transactions/native"));
    assert!(request.to_lowercase().contains("authorization: wechatpay2-hmac-sha256"));
    assert!(request.contains(r#""attach":"17""#));
    assert!(request.contains(r#""total":2500"#));
}

#[tokio::test]
async fn test_wechat_create_payment_surfaces_api_error() {
    let (url, _request) = serve_once(
        "400 Bad Request",
        r#"{"code":"PARAM_ERROR","message":"mchid mismatch"}"#,
    )
    .await;
    let gateway = WechatGateway::new(&wechat_config(Some(url)), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let err = gateway
        .create_payment(1, dec("1.00"), "ORD1")
        .await
        .unwrap_err();
    match err {
        GatewayError::Api(api) => {
            assert_eq!(api.code, "PARAM_ERROR");
            assert_eq!(api.message, "mchid mismatch");
        }
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wechat_create_payment_rejects_sub_fen_amount() {
    let gateway = WechatGateway::new(&wechat_config(None), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let err = gateway
        .create_payment(1, dec("1.005"), "ORD1")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidAmount(_)));
}

#[test]
fn test_wechat_verify_callback_success() {
    let gateway = WechatGateway::new(&wechat_config(None), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let outcome = gateway.verify_callback(&wechat_callback(17, "SUCCESS")).unwrap();
    assert_eq!(outcome.payment_id, 17);
    assert_eq!(outcome.trade_no, "4200000001");
    assert_eq!(outcome.status, PaymentStatus::Paid);
    assert_eq!(outcome.amount, dec("25.00"));
}

#[test]
fn test_wechat_verify_callback_requires_total_fee_in_fen() {
    let gateway = WechatGateway::new(&wechat_config(None), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let mut fields = wechat_callback(17, "SUCCESS");
    fields.insert("total_fee".into(), "25.00".into());
    fields.remove("sign");
    let sign = sign_wechat_fields(WECHAT_KEY, &fields);
    fields.insert("sign".into(), sign);

    let err = gateway.verify_callback(&fields).unwrap_err();
    assert!(matches!(err, GatewayError::MalformedCallback(_)));
}

#[test]
fn test_wechat_rejects_empty_api_key() {
    let mut config = wechat_config(None);
    config.api_key.clear();

    let result = WechatGateway::new(&config, DEFAULT_REQUEST_TIMEOUT);
    assert!(matches!(result, Err(GatewayError::Config(_))));
}

#[test]
fn test_wechat_verify_callback_failed_result() {
    let gateway = WechatGateway::new(&wechat_config(None), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let outcome = gateway.verify_callback(&wechat_callback(17, "FAIL")).unwrap();
    assert_eq!(outcome.status, PaymentStatus::Failed);
}

#[test]
fn test_wechat_verify_callback_rejects_tampered_field() {
    let gateway = WechatGateway::new(&wechat_config(None), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let mut fields = wechat_callback(17, "SUCCESS");
    fields.insert("attach".into(), "18".into());

    let err = gateway.verify_callback(&fields).unwrap_err();
    assert!(matches!(err, GatewayError::InvalidSignature));
}

#[test]
fn test_wechat_verify_callback_missing_sign() {
    let gateway = WechatGateway::new(&wechat_config(None), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let mut fields = wechat_callback(17, "SUCCESS");
    fields.remove("sign");

    let err = gateway.verify_callback(&fields).unwrap_err();
    assert!(matches!(err, GatewayError::MalformedCallback(_)));
}

#[test]
fn test_wechat_verify_callback_wrong_merchant() {
    let gateway = WechatGateway::new(&wechat_config(None), DEFAULT_REQUEST_TIMEOUT).unwrap();

    let mut fields = wechat_callback(17, "SUCCESS");
    fields.insert("mch_id".into(), "1900000999".into());
    fields.remove("sign");
    let sign = sign_wechat_fields(WECHAT_KEY, &fields);
    fields.insert("sign".into(), sign);

    let err = gateway.verify_callback(&fields).unwrap_err();
    assert!(matches!(err, GatewayError::MalformedCallback(_)));
}

// ==================== Alipay tests ====================

#[tokio::test]
async fn test_alipay_create_payment_builds_signed_url() {
    let gateway = AlipayGateway::new(&alipay_config()).unwrap();

    let url = gateway
        .create_payment(5, dec("25"), "ORD20240101120000042")
        .await
        .unwrap();

    assert!(url.starts_with("https://openapi.alipaydev.com/gateway.do?"));
    assert!(url.contains("method=alipay.trade.page.pay"));
    assert!(url.contains("sign="));
    assert!(url.contains(&urlencoding::encode(r#""total_amount":"25.00""#).to_string()));
    assert!(url.contains(&urlencoding::encode(r#""passback_params":"5""#).to_string()));
}

#[test]
fn test_alipay_verify_callback_status_mapping() {
    let gateway = AlipayGateway::new(&alipay_config()).unwrap();

    let paid = gateway.verify_callback(&alipay_callback(5, "TRADE_SUCCESS")).unwrap();
    assert_eq!(paid.payment_id, 5);
    assert_eq!(paid.trade_no, "2024010122001");
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert_eq!(paid.amount, dec("25"));

    let finished = gateway.verify_callback(&alipay_callback(5, "TRADE_FINISHED")).unwrap();
    assert_eq!(finished.status, PaymentStatus::Paid);

    let closed = gateway.verify_callback(&alipay_callback(5, "TRADE_CLOSED")).unwrap();
    assert_eq!(closed.status, PaymentStatus::Failed);
}

#[test]
fn test_alipay_verify_callback_rejects_pending_trade() {
    let gateway = AlipayGateway::new(&alipay_config()).unwrap();

    let err = gateway
        .verify_callback(&alipay_callback(5, "WAIT_BUYER_PAY"))
        .unwrap_err();
    assert!(matches!(err, GatewayError::MalformedCallback(_)));
}

#[test]
fn test_alipay_verify_callback_wrong_secret() {
    let mut config = alipay_config();
    config.app_secret = "another-secret".into();
    let gateway = AlipayGateway::new(&config).unwrap();

    let err = gateway
        .verify_callback(&alipay_callback(5, "TRADE_SUCCESS"))
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidSignature));
}

#[test]
fn test_alipay_rejects_empty_secret() {
    let mut config = alipay_config();
    config.app_secret.clear();

    assert!(matches!(
        AlipayGateway::new(&config),
        Err(GatewayError::Config(_))
    ));
}

#[test]
fn test_serialize_callback_is_sorted_json() {
    let gateway = AlipayGateway::new(&alipay_config()).unwrap();

    let mut fields = CallbackFields::new();
    fields.insert("b".into(), "2".into());
    fields.insert("a".into(), "1".into());

    assert_eq!(gateway.serialize_callback(&fields), r#"{"a":"1","b":"2"}"#);
}

// ==================== Registry tests ====================

#[test]
fn test_registry_only_holds_enabled_providers() {
    let mut alipay = alipay_config();
    alipay.enabled = false;

    let config = PaymentConfig {
        timeout: Duration::from_secs(3),
        wechat: Some(wechat_config(None)),
        alipay: Some(alipay),
    };

    let gateways = Gateways::from_config(&config).unwrap();
    assert_eq!(gateways.enabled(), vec![PaymentMethod::Wechat]);
    assert!(gateways.get(PaymentMethod::Wechat).is_some());
    assert!(gateways.get(PaymentMethod::Alipay).is_none());
}

#[test]
fn test_registry_refuses_enabled_provider_without_secret() {
    let mut alipay = alipay_config();
    alipay.app_secret.clear();

    let config = PaymentConfig {
        timeout: Duration::ZERO,
        wechat: None,
        alipay: Some(alipay),
    };

    assert!(matches!(
        Gateways::from_config(&config),
        Err(GatewayError::Config(_))
    ));
}

#[test]
fn test_registry_empty_by_default() {
    let gateways = Gateways::from_config(&PaymentConfig::default()).unwrap();
    assert!(gateways.enabled().is_empty());
}

// ==================== Signing helper tests ====================

#[test]
fn test_canonical_string_sorts_and_skips() {
    let mut fields = CallbackFields::new();
    fields.insert("z".into(), "last".into());
    fields.insert("a".into(), "first".into());
    fields.insert("empty".into(), String::new());
    fields.insert("sign".into(), "xyz".into());

    assert_eq!(sign::canonical_string(&fields, &["sign"]), "a=first&z=last");
}

#[test]
fn test_to_cents() {
    assert_eq!(sign::to_cents(dec("25.00")).unwrap(), 2500);
    assert_eq!(sign::to_cents(dec("0.01")).unwrap(), 1);
    assert!(sign::to_cents(dec("0.001")).is_err());
    assert!(sign::to_cents(dec("-1")).is_err());
}
