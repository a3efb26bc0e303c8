//! Pages the shell serves. Startup refuses a route table that leaves any of
//! them without a rule.

use dsl_core::{DomainError, RoutePath};
use dsl_infra::Collection::{self, Drivers, Loads, MaintenanceRecords, Payroll, Shipments, Vehicles};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct View {
    pub path: &'static str,
    pub title: &'static str,
    /// Data collections the page reads. Nothing else is served through it.
    pub collections: &'static [Collection],
}

const ALL: &[Collection] = &[Drivers, Loads, Shipments, Payroll, Vehicles, MaintenanceRecords];

const fn page(path: &'static str, title: &'static str) -> View {
    View {
        path,
        title,
        collections: &[],
    }
}

const fn data(path: &'static str, title: &'static str, collections: &'static [Collection]) -> View {
    View {
        path,
        title,
        collections,
    }
}

pub const VIEWS: &[View] = &[
    page("/", "Home"),
    page("/login", "Sign in"),
    page("/register", "Create account"),
    page("/reset-password", "Reset password"),
    page("/unauthorized", "Access denied"),
    data("/admin-dashboard", "Operations", ALL),
    data("/dashboard", "Fleet overview", ALL),
    data("/payroll", "Payroll", &[Payroll, Drivers]),
    data("/vehicles", "Vehicles", &[Vehicles]),
    data("/maintenance", "Maintenance", &[MaintenanceRecords, Vehicles]),
    data("/driver-management", "Drivers", &[Drivers]),
    data("/driver-dashboard", "My loads", &[Drivers, Loads]),
    data("/broker-dashboard", "My shipments", &[Shipments]),
    data("/broker-payroll", "Payouts", &[Payroll]),
    data("/loads", "Loads", &[Loads]),
    data("/shipments", "Shipments", &[Shipments]),
    page("/route-calculator", "Trip planner"),
    page("/uploads", "Documents"),
    page("/profile", "Profile"),
];

pub fn catalog() -> Result<Vec<RoutePath>, DomainError> {
    VIEWS.iter().map(|view| RoutePath::parse(view.path)).collect()
}

pub fn find(path: &RoutePath) -> Option<&'static View> {
    VIEWS.iter().find(|view| view.path == path.as_str())
}

impl View {
    pub fn serves(&self, collection: Collection) -> bool {
        self.collections.contains(&collection)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use dsl_auth::RoutePolicy;

    use super::*;

    #[test]
    fn catalog_paths_are_valid_and_unique() {
        let catalog = catalog().unwrap();
        let unique: HashSet<_> = catalog.iter().collect();
        assert_eq!(unique.len(), VIEWS.len());
    }

    #[test]
    fn builtin_table_covers_every_view() {
        let policy = RoutePolicy::builtin().unwrap();
        policy.ensure_covers(catalog().unwrap().iter()).unwrap();
    }

    #[test]
    fn find_by_path() {
        let path = RoutePath::parse("/payroll").unwrap();
        assert_eq!(find(&path).map(|v| v.title), Some("Payroll"));
        assert!(find(&RoutePath::parse("/nowhere").unwrap()).is_none());
    }

    #[test]
    fn only_payroll_pages_serve_payroll() {
        let serving: Vec<&str> = VIEWS
            .iter()
            .filter(|view| view.serves(Collection::Payroll))
            .map(|view| view.path)
            .collect();
        assert_eq!(serving, ["/admin-dashboard", "/dashboard", "/payroll", "/broker-payroll"]);
        let profile = find(&RoutePath::parse("/profile").unwrap()).unwrap();
        assert!(profile.collections.is_empty());
    }
}
