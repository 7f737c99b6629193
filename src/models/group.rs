/// A named category posts may optionally belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// The slice of a group a post listing needs for its badge link.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl Group {
    pub fn to_ref(&self) -> GroupRef {
        GroupRef {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
        }
    }
}

impl NewGroup {
    pub fn new(title: impl Into<String>, slug: impl Into<String>, description: impl Into<String>) -> Self {
        NewGroup {
            title: title.into(),
            slug: slug.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Group title cannot be empty".to_string());
        }

        if self.title.len() > 200 {
            return Err("Group title cannot exceed 200 characters".to_string());
        }

        if self.slug.is_empty() {
            return Err("Group slug cannot be empty".to_string());
        }

        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("Group slug may only contain letters, numbers, hyphens and underscores".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_validation() {
        assert!(NewGroup::new("Rust", "rust-lang", "").validate().is_ok());
        assert!(NewGroup::new("", "rust", "").validate().is_err());
        assert!(NewGroup::new("Rust", "", "").validate().is_err());
        assert!(NewGroup::new("Rust", "has space", "").validate().is_err());
    }
}
