/// A registered kind of ping. Only pings that opt in carry the persisted
/// client id in `client_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingType {
    name: String,
    include_client_id: bool,
}

impl PingType {
    pub fn new(name: impl Into<String>, include_client_id: bool) -> Self {
        Self {
            name: name.into(),
            include_client_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn include_client_id(&self) -> bool {
        self.include_client_id
    }
}
