//! The fixed catalog of journey chokepoints.
//!
//! The set of names is closed: attempts against any other name are ignored
//! by the aggregator. The catalog is seeded at construction and reseeded
//! identically on every clear.

use std::collections::BTreeMap;

use crate::models::ChokePoint;

/// `(name, screen, description)` for every registered chokepoint.
pub const CHOKEPOINT_CATALOG: &[(&str, &str, &str)] = &[
    ("app_initialization", "App", "Application startup and initialization"),
    ("font_loading", "App", "Custom font loading"),
    ("auth_check", "App", "Stored authentication check on launch"),
    ("signin_form_submission", "SignIn", "Sign-in form submission"),
    ("signup_form_submission", "SignUp", "Sign-up form submission"),
    ("auth_api_response", "Auth", "Authentication API response"),
    ("message_sending", "Chat", "Sending a chat message"),
    ("ai_response_generation", "Chat", "AI response generation"),
    ("message_display", "Chat", "Rendering received messages"),
    ("connections_loading", "Connections", "Loading the connections list"),
    ("connection_request_sending", "Connections", "Sending a connection request"),
    ("compatibility_calculation", "Connections", "Compatibility score calculation"),
    ("insights_data_loading", "Insights", "Loading insights data"),
    ("personality_analysis", "Insights", "Personality analysis"),
    ("behavioral_pattern_recognition", "Insights", "Behavioral pattern recognition"),
    ("screen_navigation", "Global", "Navigation between screens"),
    ("animation_completion", "Global", "Completion of UI animations"),
];

/// Build a fresh, zeroed catalog keyed by chokepoint name.
pub fn seed_catalog() -> BTreeMap<String, ChokePoint> {
    CHOKEPOINT_CATALOG
        .iter()
        .map(|(name, screen, description)| {
            (
                (*name).to_string(),
                ChokePoint::new(*name, *screen, *description),
            )
        })
        .collect()
}

/// `true` when `name` is one of the registered chokepoints.
pub fn is_registered(name: &str) -> bool {
    CHOKEPOINT_CATALOG.iter().any(|(n, _, _)| *n == name)
}
