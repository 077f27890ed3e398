#[derive(Clone)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub(crate) fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("token", &"***").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Credential;

    #[test]
    fn test_bearer_authorization() {
        let credential = Credential::new("abc-123");
        assert_eq!(credential.authorization(), "Bearer abc-123");
        assert!(!format!("{credential:?}").contains("abc-123"));
    }
}
