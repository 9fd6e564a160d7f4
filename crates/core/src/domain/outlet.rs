use serde::{Deserialize, Serialize};

/// Retail outlet row as stored in the outlets table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outlet {
    pub name: String,
    pub city: String,
    pub state: String,
    pub opening_hours: Option<String>,
    pub services: Option<String>,
}

impl Outlet {
    /// One-line summary used in conversational responses.
    pub fn summary(&self) -> String {
        let hours = self.opening_hours.as_deref().unwrap_or("TBD");
        format!("{} — opens {hours}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::Outlet;

    #[test]
    fn summary_falls_back_when_hours_unknown() {
        let outlet = Outlet {
            name: "Kopi SS 2".to_string(),
            city: "Petaling Jaya".to_string(),
            state: "Selangor".to_string(),
            opening_hours: None,
            services: Some("Dine-in".to_string()),
        };
        assert_eq!(outlet.summary(), "Kopi SS 2 — opens TBD");
    }
}
