use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Patient,
    Doctor,
    Employee,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Patient => write!(f, "patient"),
            UserRole::Doctor => write!(f, "doctor"),
            UserRole::Employee => write!(f, "employee"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(UserRole::Patient),
            "doctor" => Ok(UserRole::Doctor),
            "employee" => Ok(UserRole::Employee),
            "admin" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Appointments,
    Availabilities,
    Users,
    Prescriptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

/// Role to resource-action grants, looked up on every guarded operation.
///
/// The table is data, not code: handlers ask `is_allowed` and never
/// hard-code role names. An unknown role or an absent entry denies.
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    grants: HashMap<UserRole, HashMap<Resource, Vec<Action>>>,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        use Action::*;
        use Resource::*;
        use UserRole::*;

        let mut grants: HashMap<UserRole, HashMap<Resource, Vec<Action>>> = HashMap::new();

        let mut patient = HashMap::new();
        patient.insert(Appointments, vec![Create, Read, Update]);
        grants.insert(Patient, patient);

        let mut employee = HashMap::new();
        employee.insert(Appointments, vec![Create, Read, Update, Delete]);
        employee.insert(Availabilities, vec![Create, Read, Update, Delete]);
        employee.insert(Prescriptions, vec![Read]);
        grants.insert(Employee, employee);

        let mut doctor = HashMap::new();
        doctor.insert(Appointments, vec![Read, Update]);
        doctor.insert(Availabilities, vec![Create, Read, Update, Delete]);
        doctor.insert(Prescriptions, vec![Create, Read, Update]);
        grants.insert(Doctor, doctor);

        let mut admin = HashMap::new();
        admin.insert(Appointments, vec![Create, Read, Update, Delete]);
        admin.insert(Availabilities, vec![Create, Read, Update, Delete]);
        admin.insert(Users, vec![Create, Read, Update, Delete]);
        admin.insert(Prescriptions, vec![Create, Read, Update, Delete]);
        grants.insert(Admin, admin);

        Self { grants }
    }
}

impl PermissionPolicy {
    pub fn is_allowed(&self, role: UserRole, resource: Resource, action: Action) -> bool {
        self.grants
            .get(&role)
            .and_then(|by_resource| by_resource.get(&resource))
            .map(|actions| actions.contains(&action))
            .unwrap_or(false)
    }

    /// Convenience for the common handler path where the role arrives as an
    /// optional string claim. Missing or unrecognized roles are denied.
    pub fn allows_str(&self, role: Option<&str>, resource: Resource, action: Action) -> bool {
        role.and_then(|r| UserRole::from_str(r).ok())
            .map(|r| self.is_allowed(r, resource, action))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_can_book_but_not_delete_appointments() {
        let policy = PermissionPolicy::default();
        assert!(policy.is_allowed(UserRole::Patient, Resource::Appointments, Action::Create));
        assert!(policy.is_allowed(UserRole::Patient, Resource::Appointments, Action::Read));
        assert!(policy.is_allowed(UserRole::Patient, Resource::Appointments, Action::Update));
        assert!(!policy.is_allowed(UserRole::Patient, Resource::Appointments, Action::Delete));
    }

    #[test]
    fn patient_cannot_touch_availabilities() {
        let policy = PermissionPolicy::default();
        assert!(!policy.is_allowed(UserRole::Patient, Resource::Availabilities, Action::Read));
        assert!(!policy.is_allowed(UserRole::Patient, Resource::Availabilities, Action::Create));
    }

    #[test]
    fn doctor_manages_availability_but_cannot_create_appointments() {
        let policy = PermissionPolicy::default();
        assert!(policy.is_allowed(UserRole::Doctor, Resource::Availabilities, Action::Create));
        assert!(policy.is_allowed(UserRole::Doctor, Resource::Availabilities, Action::Delete));
        assert!(!policy.is_allowed(UserRole::Doctor, Resource::Appointments, Action::Create));
        assert!(policy.is_allowed(UserRole::Doctor, Resource::Appointments, Action::Update));
    }

    #[test]
    fn employee_covers_scheduling_but_not_users() {
        let policy = PermissionPolicy::default();
        assert!(policy.is_allowed(UserRole::Employee, Resource::Appointments, Action::Delete));
        assert!(policy.is_allowed(UserRole::Employee, Resource::Availabilities, Action::Update));
        assert!(policy.is_allowed(UserRole::Employee, Resource::Prescriptions, Action::Read));
        assert!(!policy.is_allowed(UserRole::Employee, Resource::Prescriptions, Action::Create));
        assert!(!policy.is_allowed(UserRole::Employee, Resource::Users, Action::Read));
    }

    #[test]
    fn only_admin_manages_users() {
        let policy = PermissionPolicy::default();
        assert!(policy.is_allowed(UserRole::Admin, Resource::Users, Action::Create));
        assert!(policy.is_allowed(UserRole::Admin, Resource::Users, Action::Delete));
        for role in [UserRole::Patient, UserRole::Doctor, UserRole::Employee] {
            assert!(!policy.is_allowed(role, Resource::Users, Action::Read));
        }
    }

    #[test]
    fn unknown_role_string_is_denied() {
        let policy = PermissionPolicy::default();
        assert!(!policy.allows_str(Some("superuser"), Resource::Appointments, Action::Read));
        assert!(!policy.allows_str(None, Resource::Appointments, Action::Read));
        assert!(policy.allows_str(Some("patient"), Resource::Appointments, Action::Create));
    }

    #[test]
    fn role_round_trips_through_strings() {
        for (s, role) in [
            ("patient", UserRole::Patient),
            ("doctor", UserRole::Doctor),
            ("employee", UserRole::Employee),
            ("admin", UserRole::Admin),
        ] {
            assert_eq!(UserRole::from_str(s).unwrap(), role);
            assert_eq!(role.to_string(), s);
        }
    }
}
