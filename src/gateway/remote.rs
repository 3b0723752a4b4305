/// Remote key names and their IRCC codes
pub const REMOTE_KEYS: &[(&str, &str)] = &[
    ("Up", "AAAAAQAAAAEAAAB0Aw=="),
    ("Down", "AAAAAQAAAAEAAAB1Aw=="),
    ("Left", "AAAAAQAAAAEAAAA0Aw=="),
    ("Right", "AAAAAQAAAAEAAAAzAw=="),
    ("Confirm", "AAAAAQAAAAEAAABlAw=="),
    ("Return", "AAAAAgAAAJcAAAAjAw=="),
    ("Home", "AAAAAQAAAAEAAABgAw=="),
    ("Back", "AAAAAgAAAJcAAAAjAw=="),
];

pub fn ircc_code(key: &str) -> Option<&'static str> {
    REMOTE_KEYS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, code)| *code)
}

/// SOAP body for `X_SendIRCC`
pub fn ircc_envelope(code: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:X_SendIRCC xmlns:u="urn:schemas-sony-com:service:IRCC:1">
      <IRCCCode>{}</IRCCCode>
    </u:X_SendIRCC>
  </s:Body>
</s:Envelope>"#,
        code
    )
}
