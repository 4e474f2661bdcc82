//! Role capabilities
//!
//! A static mapping from role to the operations it may perform.

use serde::{Deserialize, Serialize};

/// Member role within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Manager,
    Technician,
    Accountant,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Manager => "manager",
            Role::Technician => "technician",
            Role::Accountant => "accountant",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Role::Owner),
            "manager" => Some(Role::Manager),
            "technician" => Some(Role::Technician),
            "accountant" => Some(Role::Accountant),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Owner | Role::Manager => &[
                ViewLots,
                CreateLot,
                EditLot,
                SplitLot,
                DeleteLot,
                RecordProduction,
                CreateSale,
                RecordPayment,
                CreateExpense,
                DeleteExpense,
                RecordHealth,
                PlanVaccinations,
                ViewReports,
                ExportData,
            ],
            Role::Technician => &[ViewLots, RecordProduction, RecordHealth, ViewReports],
            Role::Accountant => &[
                ViewLots,
                CreateSale,
                RecordPayment,
                CreateExpense,
                ViewReports,
                ExportData,
            ],
            Role::Viewer => &[ViewLots, ViewReports],
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewLots,
    CreateLot,
    EditLot,
    SplitLot,
    DeleteLot,
    /// Daily mortality, feed, water, weight and egg entries
    RecordProduction,
    CreateSale,
    RecordPayment,
    CreateExpense,
    DeleteExpense,
    /// Treatments, vaccinations and vet visits
    RecordHealth,
    /// Lot vaccination programs
    PlanVaccinations,
    ViewReports,
    ExportData,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewLots => "view_lots",
            Capability::CreateLot => "create_lot",
            Capability::EditLot => "edit_lot",
            Capability::SplitLot => "split_lot",
            Capability::DeleteLot => "delete_lot",
            Capability::RecordProduction => "record_production",
            Capability::CreateSale => "create_sale",
            Capability::RecordPayment => "record_payment",
            Capability::CreateExpense => "create_expense",
            Capability::DeleteExpense => "delete_expense",
            Capability::RecordHealth => "record_health",
            Capability::PlanVaccinations => "plan_vaccinations",
            Capability::ViewReports => "view_reports",
            Capability::ExportData => "export_data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_and_manager_can_split() {
        assert!(Role::Owner.allows(Capability::SplitLot));
        assert!(Role::Manager.allows(Capability::SplitLot));
        assert!(!Role::Technician.allows(Capability::SplitLot));
        assert!(!Role::Accountant.allows(Capability::SplitLot));
    }

    #[test]
    fn test_technician_records_production_only() {
        assert!(Role::Technician.allows(Capability::RecordProduction));
        assert!(!Role::Technician.allows(Capability::CreateExpense));
        assert!(!Role::Technician.allows(Capability::DeleteLot));
    }

    #[test]
    fn test_technician_records_health_but_does_not_plan() {
        assert!(Role::Technician.allows(Capability::RecordHealth));
        assert!(!Role::Technician.allows(Capability::PlanVaccinations));
        assert!(Role::Manager.allows(Capability::PlanVaccinations));
        assert!(!Role::Accountant.allows(Capability::RecordHealth));
    }

    #[test]
    fn test_accountant_handles_money() {
        assert!(Role::Accountant.allows(Capability::CreateSale));
        assert!(Role::Accountant.allows(Capability::RecordPayment));
        assert!(!Role::Accountant.allows(Capability::DeleteExpense));
        assert!(!Role::Accountant.allows(Capability::RecordProduction));
    }

    #[test]
    fn test_viewer_is_read_only() {
        assert_eq!(Role::Viewer.capabilities(), &[Capability::ViewLots, Capability::ViewReports]);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Owner"), Some(Role::Owner));
        assert_eq!(Role::parse("admin"), None);
    }
}
