use super::*;

#[test]
fn conversation_endpoint_formats_expected_path() {
    assert_eq!(conversation_endpoint("c123"), "/api/v1/messages/conversation/c123");
}

#[test]
fn endpoints_percent_encode_ids() {
    assert_eq!(conversation_endpoint("a/b c"), "/api/v1/messages/conversation/a%2Fb%20c");
    assert_eq!(favorite_endpoint("p?1"), "/api/v1/favorites/p%3F1");
}

#[test]
fn encode_segment_keeps_unreserved_and_encodes_utf8() {
    assert_eq!(encode_segment("A-z_0.9~"), "A-z_0.9~");
    assert_eq!(encode_segment("ñ%"), "%C3%B1%25");
}

#[test]
fn favorite_endpoints_format_expected_paths() {
    assert_eq!(favorite_endpoint("p-1"), "/api/v1/favorites/p-1");
    assert_eq!(favorite_check_endpoint("p-1"), "/api/v1/favorites/check/p-1");
}

#[test]
fn viewing_request_endpoint_formats_expected_path() {
    assert_eq!(viewing_request_endpoint("v_9"), "/api/v1/viewing-requests/v_9");
}

#[test]
fn parse_body_reports_decode_errors() {
    let err = parse_body::<MessagesResponse>("{\"messages\": 4}").unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[test]
fn parse_body_ignores_envelope_extras() {
    let body: MessagesResponse = parse_body("{\"success\": true, \"messages\": []}").unwrap();
    assert!(body.messages.is_empty());
}

#[test]
fn new_gateway_normalizes_base_url() {
    let config = ClientConfig { base_url: "http://localhost:8000/".into(), ..ClientConfig::default() };
    let gateway = HttpGateway::new(&config).unwrap();
    assert_eq!(gateway.base_url(), "http://localhost:8000");
}

#[test]
fn new_gateway_rejects_bad_base_url() {
    let config = ClientConfig { base_url: "localhost".into(), ..ClientConfig::default() };
    assert!(matches!(HttpGateway::new(&config), Err(ApiError::Config(_))));
}
