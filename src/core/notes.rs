//! Free-text notes sent along with a replicated lead.

use crate::domain::TourContext;

/// Trailing marker naming the channel the lead came through
pub const CHANNEL_MARKER: &str = "Lead via website form";

const SEPARATOR: &str = " | ";

/// Compose the notes value from the trip details.
///
/// Parts appear in a fixed order: participant count, alternate participant
/// count, tour description, tour list. Empty parts and repeats of an
/// earlier part are dropped; the channel marker always comes last.
pub fn compose_notes(context: &TourContext) -> String {
    let candidates = [
        context.npart.as_deref().map(|n| format!("Participants: {}", n.trim())),
        context
            .participants
            .as_deref()
            .map(|n| format!("Participants: {}", n.trim())),
        context
            .tour_details
            .as_deref()
            .map(|d| format!("Tour: {}", d.trim())),
        context
            .tours
            .as_ref()
            .map(|t| t.joined())
            .filter(|t| !t.is_empty())
            .map(|t| format!("Tours: {}", t)),
    ];

    let mut parts: Vec<String> = Vec::new();
    for part in candidates.into_iter().flatten() {
        // "Participants: " with nothing after it
        if part.ends_with(": ") || parts.contains(&part) {
            continue;
        }
        parts.push(part);
    }

    parts.push(CHANNEL_MARKER.to_string());
    parts.join(SEPARATOR)
}
