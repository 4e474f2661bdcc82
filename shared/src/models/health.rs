//! Health events and vaccination schedules

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HealthEventType {
    Vaccination,
    Treatment,
    VetVisit,
    LabAnalysis,
    Prophylaxis,
    Deworming,
    Vitamin,
}

impl HealthEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthEventType::Vaccination => "vaccination",
            HealthEventType::Treatment => "treatment",
            HealthEventType::VetVisit => "vet_visit",
            HealthEventType::LabAnalysis => "lab_analysis",
            HealthEventType::Prophylaxis => "prophylaxis",
            HealthEventType::Deworming => "deworming",
            HealthEventType::Vitamin => "vitamin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vaccination" => Some(HealthEventType::Vaccination),
            "treatment" => Some(HealthEventType::Treatment),
            "vet_visit" => Some(HealthEventType::VetVisit),
            "lab_analysis" => Some(HealthEventType::LabAnalysis),
            "prophylaxis" => Some(HealthEventType::Prophylaxis),
            "deworming" => Some(HealthEventType::Deworming),
            "vitamin" => Some(HealthEventType::Vitamin),
            _ => None,
        }
    }
}

/// How a product is administered to the flock
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdministrationRoute {
    Water,
    Feed,
    Injection,
    Spray,
    EyeDrop,
    Oral,
}

impl AdministrationRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdministrationRoute::Water => "water",
            AdministrationRoute::Feed => "feed",
            AdministrationRoute::Injection => "injection",
            AdministrationRoute::Spray => "spray",
            AdministrationRoute::EyeDrop => "eye_drop",
            AdministrationRoute::Oral => "oral",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "water" => Some(AdministrationRoute::Water),
            "feed" => Some(AdministrationRoute::Feed),
            "injection" => Some(AdministrationRoute::Injection),
            "spray" => Some(AdministrationRoute::Spray),
            "eye_drop" => Some(AdministrationRoute::EyeDrop),
            "oral" => Some(AdministrationRoute::Oral),
            _ => None,
        }
    }
}

/// A treatment, vaccination or visit applied to a whole lot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthEvent {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub date: NaiveDate,
    pub event_type: HealthEventType,
    pub product_name: Option<String>,
    pub route: Option<AdministrationRoute>,
    pub dose: Option<String>,
    pub target_disease: Option<String>,
    pub withdrawal_days_meat: Option<i32>,
    pub withdrawal_days_eggs: Option<i32>,
    pub cost: Option<Decimal>,
    pub notes: Option<String>,
    pub inherited_from_lot_id: Option<Uuid>,
    pub original_event_id: Option<Uuid>,
}

impl HealthEvent {
    /// Copy this event onto a lot split off from its own
    ///
    /// The treatment applied to every bird before the split, so the copy is
    /// verbatim except that the cost stays with the lot that paid for it.
    pub fn inherited_copy(&self, new_id: Uuid, child_lot_id: Uuid, source_code: &str) -> HealthEvent {
        HealthEvent {
            id: new_id,
            lot_id: child_lot_id,
            cost: None,
            notes: Some(inherited_note(source_code, self.notes.as_deref())),
            inherited_from_lot_id: Some(self.lot_id),
            original_event_id: Some(self.id),
            ..self.clone()
        }
    }
}

/// A planned vaccination window, by bird age in days
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaccinationSchedule {
    pub id: Uuid,
    /// Lot-scoped schedules only; templates have no lot
    pub lot_id: Option<Uuid>,
    pub vaccine_name: String,
    pub target_disease: String,
    pub day_from: i32,
    pub day_to: Option<i32>,
    pub route: Option<AdministrationRoute>,
    pub dose: Option<String>,
    pub is_mandatory: bool,
    pub notes: Option<String>,
    pub inherited_from_lot_id: Option<Uuid>,
    pub original_schedule_id: Option<Uuid>,
}

impl VaccinationSchedule {
    pub fn inherited_copy(
        &self,
        new_id: Uuid,
        child_lot_id: Uuid,
        source_code: &str,
    ) -> VaccinationSchedule {
        VaccinationSchedule {
            id: new_id,
            lot_id: Some(child_lot_id),
            notes: Some(inherited_note(source_code, self.notes.as_deref())),
            inherited_from_lot_id: self.lot_id,
            original_schedule_id: Some(self.id),
            ..self.clone()
        }
    }

    pub fn is_due(&self, age_days: i32) -> bool {
        age_days >= self.day_from && self.day_to.map_or(age_days == self.day_from, |to| age_days <= to)
    }

    /// Where a lot of `age_days` stands against this window, looking
    /// `days_ahead` forward; `None` when the window is further out
    pub fn timing(&self, age_days: i32, days_ahead: i32) -> Option<VaccinationTiming> {
        if self.is_due(age_days) {
            Some(VaccinationTiming::Due)
        } else if age_days > self.day_from {
            Some(VaccinationTiming::Overdue)
        } else if self.day_from <= age_days.saturating_add(days_ahead) {
            Some(VaccinationTiming::Upcoming)
        } else {
            None
        }
    }

    /// Calendar date on which the window opens for a lot
    pub fn opens_on(&self, placement_date: NaiveDate, age_at_placement: i32) -> NaiveDate {
        placement_date + Duration::days(i64::from(self.day_from) - i64::from(age_at_placement))
    }

    /// A vaccination event for the same product has already been recorded
    pub fn is_administered(&self, administered: &[String]) -> bool {
        let name = self.vaccine_name.trim();
        administered
            .iter()
            .any(|product| product.trim().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VaccinationTiming {
    Upcoming,
    Due,
    Overdue,
}

/// The lot fields an upcoming vaccination needs
#[derive(Debug, Clone)]
pub struct VaccinationLot {
    pub id: Uuid,
    pub code: String,
    pub name: Option<String>,
    pub placement_date: NaiveDate,
    pub age_at_placement: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpcomingVaccination {
    pub lot_id: Uuid,
    pub lot_code: String,
    pub lot_name: Option<String>,
    pub schedule_id: Uuid,
    pub vaccine_name: String,
    pub target_disease: String,
    pub day_from: i32,
    pub day_to: Option<i32>,
    pub route: Option<AdministrationRoute>,
    pub is_mandatory: bool,
    pub due_date: NaiveDate,
    pub timing: VaccinationTiming,
}

/// Vaccinations of one lot that are open, due soon or missed
///
/// Schedules whose vaccine already shows up among the lot's vaccination
/// events are left out.
pub fn upcoming_vaccinations(
    lot: &VaccinationLot,
    schedules: &[VaccinationSchedule],
    administered: &[String],
    today: NaiveDate,
    days_ahead: i32,
) -> Vec<UpcomingVaccination> {
    let age = crate::models::age_days(lot.placement_date, lot.age_at_placement, today);
    let age = i32::try_from(age).unwrap_or(i32::MAX);

    let mut upcoming: Vec<UpcomingVaccination> = schedules
        .iter()
        .filter(|schedule| !schedule.is_administered(administered))
        .filter_map(|schedule| {
            let timing = schedule.timing(age, days_ahead)?;
            Some(UpcomingVaccination {
                lot_id: lot.id,
                lot_code: lot.code.clone(),
                lot_name: lot.name.clone(),
                schedule_id: schedule.id,
                vaccine_name: schedule.vaccine_name.clone(),
                target_disease: schedule.target_disease.clone(),
                day_from: schedule.day_from,
                day_to: schedule.day_to,
                route: schedule.route,
                is_mandatory: schedule.is_mandatory,
                due_date: schedule.opens_on(lot.placement_date, lot.age_at_placement),
                timing,
            })
        })
        .collect();
    upcoming.sort_by_key(|v| v.due_date);
    upcoming
}

/// Description of the veterinary expense booked for a paid health event
pub fn health_expense_description(event_type: HealthEventType, product: Option<&str>, lot_code: &str) -> String {
    let label = match event_type {
        HealthEventType::Vaccination => "Vaccination",
        HealthEventType::Treatment => "Treatment",
        HealthEventType::VetVisit => "Vet visit",
        HealthEventType::LabAnalysis => "Lab analysis",
        HealthEventType::Prophylaxis => "Prophylaxis",
        HealthEventType::Deworming => "Deworming",
        HealthEventType::Vitamin => "Vitamins",
    };
    match product.map(str::trim).filter(|p| !p.is_empty()) {
        Some(product) => format!("{}: {} - Lot {}", label, product, lot_code),
        None => format!("{} - Lot {}", label, lot_code),
    }
}

fn inherited_note(source_code: &str, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("Inherited from lot {}. {}", source_code, notes),
        None => format!("Inherited from lot {}", source_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(lot_id: Uuid) -> HealthEvent {
        HealthEvent {
            id: Uuid::new_v4(),
            lot_id,
            date: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
            event_type: HealthEventType::Vaccination,
            product_name: Some("HB1".to_string()),
            route: Some(AdministrationRoute::Water),
            dose: Some("1 dose/bird".to_string()),
            target_disease: Some("Newcastle".to_string()),
            withdrawal_days_meat: Some(0),
            withdrawal_days_eggs: None,
            cost: Some(Decimal::from(15000)),
            notes: Some("Morning round".to_string()),
            inherited_from_lot_id: None,
            original_event_id: None,
        }
    }

    #[test]
    fn test_health_event_copy_clears_cost() {
        let source_lot = Uuid::new_v4();
        let child_lot = Uuid::new_v4();
        let original = event(source_lot);
        let copy = original.inherited_copy(Uuid::new_v4(), child_lot, "LC-2025-0001");

        assert_eq!(copy.lot_id, child_lot);
        assert_eq!(copy.cost, None);
        assert_eq!(copy.inherited_from_lot_id, Some(source_lot));
        assert_eq!(copy.original_event_id, Some(original.id));
        assert_eq!(copy.product_name, original.product_name);
        assert_eq!(copy.date, original.date);
        assert_eq!(copy.notes.as_deref(), Some("Inherited from lot LC-2025-0001. Morning round"));
    }

    #[test]
    fn test_schedule_copy_keeps_window() {
        let source_lot = Uuid::new_v4();
        let schedule = VaccinationSchedule {
            id: Uuid::new_v4(),
            lot_id: Some(source_lot),
            vaccine_name: "Gumboro".to_string(),
            target_disease: "IBD".to_string(),
            day_from: 14,
            day_to: Some(18),
            route: Some(AdministrationRoute::Water),
            dose: None,
            is_mandatory: true,
            notes: None,
            inherited_from_lot_id: None,
            original_schedule_id: None,
        };
        let copy = schedule.inherited_copy(Uuid::new_v4(), Uuid::new_v4(), "LC-2025-0002");

        assert_eq!(copy.day_from, 14);
        assert_eq!(copy.day_to, Some(18));
        assert_eq!(copy.inherited_from_lot_id, Some(source_lot));
        assert_eq!(copy.original_schedule_id, Some(schedule.id));
        assert_eq!(copy.notes.as_deref(), Some("Inherited from lot LC-2025-0002"));
        assert!(copy.is_due(16));
        assert!(!copy.is_due(19));
    }

    fn schedule(vaccine: &str, day_from: i32, day_to: Option<i32>) -> VaccinationSchedule {
        VaccinationSchedule {
            id: Uuid::new_v4(),
            lot_id: Some(Uuid::new_v4()),
            vaccine_name: vaccine.to_string(),
            target_disease: "Newcastle".to_string(),
            day_from,
            day_to,
            route: Some(AdministrationRoute::Water),
            dose: None,
            is_mandatory: true,
            notes: None,
            inherited_from_lot_id: None,
            original_schedule_id: None,
        }
    }

    #[test]
    fn test_schedule_timing() {
        let window = schedule("HB1", 14, Some(18));
        assert_eq!(window.timing(5, 7), None);
        assert_eq!(window.timing(8, 7), Some(VaccinationTiming::Upcoming));
        assert_eq!(window.timing(14, 0), Some(VaccinationTiming::Due));
        assert_eq!(window.timing(18, 0), Some(VaccinationTiming::Due));
        assert_eq!(window.timing(19, 0), Some(VaccinationTiming::Overdue));

        let single_day = schedule("Marek", 1, None);
        assert_eq!(single_day.timing(1, 0), Some(VaccinationTiming::Due));
        assert_eq!(single_day.timing(2, 0), Some(VaccinationTiming::Overdue));
    }

    #[test]
    fn test_upcoming_skips_administered_and_sorts_by_date() {
        let placed = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let lot = VaccinationLot {
            id: Uuid::new_v4(),
            code: "LC-2025-0003".to_string(),
            name: None,
            placement_date: placed,
            age_at_placement: 1,
        };
        let schedules = vec![
            schedule("Gumboro", 21, Some(24)),
            schedule("HB1", 7, Some(10)),
            schedule("Lasota", 14, Some(16)),
            schedule("Fowl pox", 60, None),
        ];
        let administered = vec!["hb1 ".to_string()];
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        let upcoming = upcoming_vaccinations(&lot, &schedules, &administered, today, 10);
        let names: Vec<_> = upcoming.iter().map(|v| v.vaccine_name.as_str()).collect();
        assert_eq!(names, vec!["Lasota", "Gumboro"]);
        assert_eq!(upcoming[0].timing, VaccinationTiming::Due);
        assert_eq!(upcoming[0].due_date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(upcoming[1].timing, VaccinationTiming::Upcoming);
    }

    #[test]
    fn test_health_expense_description() {
        assert_eq!(
            health_expense_description(HealthEventType::Vaccination, Some("HB1"), "LC-2025-0001"),
            "Vaccination: HB1 - Lot LC-2025-0001"
        );
        assert_eq!(
            health_expense_description(HealthEventType::VetVisit, Some("  "), "LP-2025-0002"),
            "Vet visit - Lot LP-2025-0002"
        );
    }
}
