//! Sentences shown to the user for each broker reply

use crate::session::{AuthOutcome, RequestOutcome};
use shared::RoomStatus;

const CLOSED: &str = "The main server has closed the connection.";

pub fn describe_auth(outcome: &AuthOutcome, username: &str) -> String {
    match outcome {
        AuthOutcome::Member => format!("Welcome member {}!", username),
        AuthOutcome::Guest => format!("Welcome guest {}!", username),
        AuthOutcome::InvalidPassword => "Failed login: Password does not match.".to_string(),
        AuthOutcome::InvalidUser => "Failed login: Username does not exist.".to_string(),
        AuthOutcome::Closed => CLOSED.to_string(),
        AuthOutcome::Unrecognized(_) => "Failed login: Invalid server response.".to_string(),
    }
}

pub fn describe_availability(outcome: &RequestOutcome) -> String {
    let status = match outcome {
        RequestOutcome::Status(status) => *status,
        RequestOutcome::Closed => return CLOSED.to_string(),
        RequestOutcome::Unrecognized(_) => {
            return "Failed to retrieve availability: Invalid server response.".to_string()
        }
    };

    match status {
        RoomStatus::Available => "The requested room is available.",
        RoomStatus::NotAvailable => "The requested room is not available.",
        RoomStatus::NotFound => "Not able to find the room layout.",
        RoomStatus::RequestEmpty => "Not able to detect a request type.",
        RoomStatus::RoomEmpty => "Not able to detect a requested room.",
        RoomStatus::InvalidRequest => "The main server detected an invalid request.",
        RoomStatus::UserNotMember => "Failed to retrieve availability: Invalid server response.",
    }
    .to_string()
}

pub fn describe_reservation(outcome: &RequestOutcome, room: &str) -> String {
    let status = match outcome {
        RequestOutcome::Status(status) => *status,
        RequestOutcome::Closed => return CLOSED.to_string(),
        RequestOutcome::Unrecognized(_) => {
            return "Failed to make reservation: Invalid server response.".to_string()
        }
    };

    match status {
        RoomStatus::Available => {
            return format!(
                "Congratulation! The reservation for Room {} has been made.",
                room
            )
        }
        RoomStatus::NotAvailable => "Sorry! The requested room is not available.",
        RoomStatus::NotFound => "Oops! Not able to find the room.",
        RoomStatus::UserNotMember => "Permission denied: Guest cannot make a reservation.",
        RoomStatus::RequestEmpty => "Not able to detect a request type.",
        RoomStatus::RoomEmpty => "Not able to detect a requested room.",
        RoomStatus::InvalidRequest => "The main server detected an invalid request.",
    }
    .to_string()
}
