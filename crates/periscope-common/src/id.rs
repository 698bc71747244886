pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short hex token pairing one bridged event with its response.
pub fn new_correlation_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    uuid.as_bytes()[..8]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
