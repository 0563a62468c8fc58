//! `ghl calendars` - calendars, free slots and appointments

use anyhow::{bail, Result};
use clap::Subcommand;
use ghl_api::resources::{AppointmentUpdate, EventQuery, NewAppointment};
use serde_json::{json, Value};

use super::confirm;
use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const CALENDAR_COLUMNS: [Column; 4] = [
    ("id", "ID"),
    ("name", "Name"),
    ("calendarType", "Type"),
    ("isActive", "Active"),
];

const CALENDAR_FIELDS: [Column; 7] = [
    ("id", "ID"),
    ("name", "Name"),
    ("description", "Description"),
    ("calendarType", "Type"),
    ("timezone", "Timezone"),
    ("slotDuration", "Slot Duration"),
    ("isActive", "Active"),
];

const APPOINTMENT_COLUMNS: [Column; 5] = [
    ("id", "ID"),
    ("title", "Title"),
    ("startTime", "Start"),
    ("appointmentStatus", "Status"),
    ("contactId", "Contact"),
];

const APPOINTMENT_FIELDS: [Column; 8] = [
    ("id", "ID"),
    ("title", "Title"),
    ("calendarId", "Calendar"),
    ("contactId", "Contact"),
    ("startTime", "Start"),
    ("endTime", "End"),
    ("appointmentStatus", "Status"),
    ("assignedUserId", "Assigned To"),
];

const SLOT_COLUMNS: [Column; 1] = [("slot", "Slot")];

#[derive(Debug, Subcommand)]
pub enum CalendarsCommand {
    /// List calendars
    List,
    /// Show a calendar
    Get { calendar_id: String },
    /// Free slots of a calendar
    Slots {
        calendar_id: String,
        /// First day (YYYY-MM-DD or epoch millis)
        #[arg(long)]
        start: String,
        /// Last day; defaults to --start
        #[arg(long)]
        end: Option<String>,
    },
    /// Appointments in a time window
    Events {
        #[arg(long)]
        calendar: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Show an appointment
    Appointment { appointment_id: String },
    /// Book an appointment
    Book {
        #[arg(long)]
        calendar: String,
        #[arg(long)]
        contact: String,
        /// ISO 8601 start time
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// e.g. confirmed, new
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        assigned_to: Option<String>,
    },
    /// Reschedule or edit an appointment
    UpdateAppointment {
        appointment_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Mark an appointment cancelled
    Cancel { appointment_id: String },
    /// Delete an appointment
    DeleteAppointment {
        appointment_id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

/// Slots are plain time strings; tables need records.
fn slot_rows(slots: Vec<Value>) -> Vec<Value> {
    slots
        .into_iter()
        .map(|slot| match slot {
            Value::Object(_) => slot,
            other => json!({ "id": other.clone(), "slot": other }),
        })
        .collect()
}

impl CalendarsCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;
        let calendars = client.calendars();

        match self {
            CalendarsCommand::List => {
                let found = calendars.list().await?;
                let rows = to_rows(&found)?;
                out.print_list(&format!("Calendars ({})", rows.len()), &rows, &CALENDAR_COLUMNS);
            }
            CalendarsCommand::Get { calendar_id } => {
                let calendar = calendars.get(calendar_id).await?;
                out.print_record(&to_record(&calendar)?, &CALENDAR_FIELDS);
            }
            CalendarsCommand::Slots { calendar_id, start, end } => {
                let slots = calendars.free_slots(calendar_id, start, end.as_deref()).await?;
                let rows = slot_rows(slots);
                out.print_list(&format!("Free slots ({})", rows.len()), &rows, &SLOT_COLUMNS);
            }
            CalendarsCommand::Events {
                calendar,
                user,
                start,
                end,
            } => {
                if calendar.is_none() && user.is_none() {
                    bail!("Specify --calendar or --user");
                }
                let events = calendars
                    .events(&EventQuery {
                        calendar_id: calendar.clone(),
                        user_id: user.clone(),
                        start_time: start.clone(),
                        end_time: end.clone(),
                    })
                    .await?;
                let rows = to_rows(&events)?;
                out.print_list(&format!("Appointments ({})", rows.len()), &rows, &APPOINTMENT_COLUMNS);
            }
            CalendarsCommand::Appointment { appointment_id } => {
                let appointment = calendars.appointment(appointment_id).await?;
                out.print_record(&to_record(&appointment)?, &APPOINTMENT_FIELDS);
            }
            CalendarsCommand::Book {
                calendar,
                contact,
                start,
                end,
                title,
                status,
                assigned_to,
            } => {
                let booked = calendars
                    .create_appointment(&NewAppointment {
                        calendar_id: calendar.clone(),
                        contact_id: contact.clone(),
                        start_time: start.clone(),
                        end_time: end.clone(),
                        title: title.clone(),
                        appointment_status: status.clone(),
                        assigned_user_id: assigned_to.clone(),
                    })
                    .await?;
                out.print_result(
                    &format!("Appointment booked: {}", booked.id),
                    &to_record(&booked)?,
                    &APPOINTMENT_FIELDS,
                );
            }
            CalendarsCommand::UpdateAppointment {
                appointment_id,
                title,
                start,
                end,
                status,
            } => {
                let update = AppointmentUpdate {
                    title: title.clone(),
                    start_time: start.clone(),
                    end_time: end.clone(),
                    appointment_status: status.clone(),
                };
                if update == AppointmentUpdate::default() {
                    bail!("No fields to update. Specify at least one option.");
                }
                let updated = calendars.update_appointment(appointment_id, &update).await?;
                out.print_result(
                    &format!("Appointment updated: {appointment_id}"),
                    &to_record(&updated)?,
                    &APPOINTMENT_FIELDS,
                );
            }
            CalendarsCommand::Cancel { appointment_id } => {
                let update = AppointmentUpdate {
                    appointment_status: Some("cancelled".into()),
                    ..AppointmentUpdate::default()
                };
                let cancelled = calendars.update_appointment(appointment_id, &update).await?;
                out.print_result(
                    &format!("Appointment cancelled: {appointment_id}"),
                    &to_record(&cancelled)?,
                    &APPOINTMENT_FIELDS,
                );
            }
            CalendarsCommand::DeleteAppointment { appointment_id, yes } => {
                if !confirm(&format!("Delete appointment {appointment_id}?"), *yes)? {
                    out.info("Cancelled");
                    return Ok(());
                }
                calendars.delete_appointment(appointment_id).await?;
                out.success(&format!("Appointment deleted: {appointment_id}"));
            }
        }
        Ok(())
    }
}
