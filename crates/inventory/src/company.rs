//! Client companies, the owners of items and shipments.

use serde::{Deserialize, Serialize};

use stocktrack_core::{CompanyId, DomainResult, Entity, require_text};

/// Maximum length of a company name.
pub const COMPANY_NAME_MAX_CHARS: usize = 200;

/// A client company: the owner of items and shipments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    id: CompanyId,
    name: String,
}

impl Company {
    /// Build a new company, validating its name.
    pub fn new(id: CompanyId, name: &str) -> DomainResult<Self> {
        let name = require_text("company name", name, COMPANY_NAME_MAX_CHARS)?;
        Ok(Self { id, name })
    }

    /// Rebuild a company from stored column values.
    pub fn restore(id: CompanyId, name: String) -> Self {
        Self { id, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> CompanyId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktrack_core::DomainError;

    #[test]
    fn new_company_trims_name() {
        let company = Company::new(CompanyId::new(), "  The Test Company ").unwrap();
        assert_eq!(company.name(), "The Test Company");
    }

    #[test]
    fn new_company_rejects_blank_and_oversize_names() {
        assert!(matches!(
            Company::new(CompanyId::new(), " "),
            Err(DomainError::Validation(_))
        ));
        let long = "x".repeat(COMPANY_NAME_MAX_CHARS + 1);
        assert!(matches!(
            Company::new(CompanyId::new(), &long),
            Err(DomainError::Validation(_))
        ));
    }
}
