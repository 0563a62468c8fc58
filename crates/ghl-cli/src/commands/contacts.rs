//! `ghl contacts` - contacts, their tags, notes and tasks

use anyhow::{bail, Result};
use clap::Subcommand;
use ghl_api::resources::{ContactQuery, ContactSearch, ContactUpdate, NewContact, NewTask, TaskUpdate};
use tracing::info;

use super::confirm;
use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

pub const CONTACT_COLUMNS: [Column; 6] = [
    ("id", "ID"),
    ("firstName", "First Name"),
    ("lastName", "Last Name"),
    ("email", "Email"),
    ("phone", "Phone"),
    ("tags", "Tags"),
];

const CONTACT_FIELDS: [Column; 16] = [
    ("id", "ID"),
    ("firstName", "First Name"),
    ("lastName", "Last Name"),
    ("name", "Full Name"),
    ("email", "Email"),
    ("phone", "Phone"),
    ("companyName", "Company"),
    ("address1", "Address"),
    ("city", "City"),
    ("state", "State"),
    ("postalCode", "Postal Code"),
    ("country", "Country"),
    ("source", "Source"),
    ("tags", "Tags"),
    ("dateAdded", "Created"),
    ("dateUpdated", "Updated"),
];

const NOTE_COLUMNS: [Column; 3] = [("id", "ID"), ("body", "Note"), ("dateAdded", "Created")];

const TASK_COLUMNS: [Column; 5] = [
    ("id", "ID"),
    ("title", "Title"),
    ("dueDate", "Due Date"),
    ("completed", "Completed"),
    ("assignedTo", "Assigned To"),
];

const TASK_FIELDS: [Column; 7] = [
    ("id", "ID"),
    ("title", "Title"),
    ("body", "Description"),
    ("dueDate", "Due Date"),
    ("completed", "Completed"),
    ("contactId", "Contact"),
    ("assignedTo", "Assigned To"),
];

#[derive(Debug, Subcommand)]
pub enum ContactsCommand {
    /// List contacts; --tag or --assigned-to use the search API
    List {
        /// Number of contacts to return
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
        /// Search text (name, email, phone)
        #[arg(long)]
        query: Option<String>,
        /// Only contacts with this tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Only contacts assigned to this user ID
        #[arg(long)]
        assigned_to: Option<String>,
        /// Follow pagination and return every contact
        #[arg(long, conflicts_with_all = ["tags", "assigned_to"])]
        all: bool,
    },
    /// Show a contact
    Get { contact_id: String },
    /// Create a contact (needs --email or --phone)
    Create {
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        phone: Option<String>,
        #[arg(short, long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Full name, used when first/last are not given
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        company: Option<String>,
        /// Lead source
        #[arg(long)]
        source: Option<String>,
        /// Tag to add (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Update fields of a contact
    Update {
        contact_id: String,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        phone: Option<String>,
        #[arg(short, long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Delete a contact
    Delete {
        contact_id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Search contacts by name, email or phone
    Search {
        query: String,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Add tags to a contact
    Tag {
        contact_id: String,
        #[arg(short, long = "tag", required = true)]
        tags: Vec<String>,
    },
    /// Remove tags from a contact
    Untag {
        contact_id: String,
        #[arg(short, long = "tag", required = true)]
        tags: Vec<String>,
    },
    /// List notes of a contact
    Notes { contact_id: String },
    /// Add a note to a contact
    AddNote { contact_id: String, note: String },
    /// Manage tasks of a contact
    #[command(subcommand)]
    Tasks(ContactTasksCommand),
}

#[derive(Debug, Subcommand)]
pub enum ContactTasksCommand {
    /// List tasks of a contact
    List { contact_id: String },
    /// Show one task
    Get { contact_id: String, task_id: String },
    /// Create a task; due date defaults to a week from now
    Add {
        contact_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: Option<String>,
        /// ISO 8601 due date
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        assigned_to: Option<String>,
    },
    /// Update a task
    Update {
        contact_id: String,
        task_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        due: Option<String>,
    },
    /// Mark a task completed (or pending again with --undo)
    Complete {
        contact_id: String,
        task_id: String,
        #[arg(long)]
        undo: bool,
    },
    /// Delete a task
    Delete {
        contact_id: String,
        task_id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

impl ContactsCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        match self {
            ContactsCommand::List {
                limit,
                query,
                tags,
                assigned_to,
                all,
            } => {
                let client = app.client()?;
                let contacts = if !tags.is_empty() || assigned_to.is_some() {
                    client
                        .contacts()
                        .search(&ContactSearch {
                            page_limit: *limit,
                            query: query.clone(),
                            tags: tags.clone(),
                            assigned_to: assigned_to.clone(),
                            ..ContactSearch::default()
                        })
                        .await?
                } else {
                    client
                        .contacts()
                        .list(&ContactQuery {
                            limit: *limit,
                            query: query.clone(),
                            all: *all,
                        })
                        .await?
                };
                let rows = to_rows(&contacts)?;
                out.print_list(&format!("Contacts ({})", rows.len()), &rows, &CONTACT_COLUMNS);
            }

            ContactsCommand::Get { contact_id } => {
                let contact = app.client()?.contacts().get(contact_id).await?;
                out.print_record(&to_record(&contact)?, &CONTACT_FIELDS);
            }

            ContactsCommand::Create {
                email,
                phone,
                first_name,
                last_name,
                name,
                company,
                source,
                tags,
            } => {
                if email.is_none() && phone.is_none() {
                    bail!("At least --email or --phone is required");
                }
                let contact = app
                    .client()?
                    .contacts()
                    .create(&NewContact {
                        email: email.clone(),
                        phone: phone.clone(),
                        first_name: first_name.clone(),
                        last_name: last_name.clone(),
                        name: name.clone(),
                        company_name: company.clone(),
                        source: source.clone(),
                        tags: tags.clone(),
                    })
                    .await?;
                info!(contact = %contact.id, "Created contact");
                out.print_result(
                    &format!("Contact created: {}", contact.id),
                    &to_record(&contact)?,
                    &CONTACT_FIELDS,
                );
            }

            ContactsCommand::Update {
                contact_id,
                email,
                phone,
                first_name,
                last_name,
                company,
                source,
            } => {
                let update = ContactUpdate {
                    email: email.clone(),
                    phone: phone.clone(),
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    company_name: company.clone(),
                    source: source.clone(),
                    custom_fields: Vec::new(),
                };
                if update.is_empty() {
                    bail!("No fields to update. Specify at least one option.");
                }
                let contact = app.client()?.contacts().update(contact_id, &update).await?;
                out.print_result(
                    &format!("Contact updated: {contact_id}"),
                    &to_record(&contact)?,
                    &CONTACT_FIELDS,
                );
            }

            ContactsCommand::Delete { contact_id, yes } => {
                if !confirm(&format!("Delete contact {contact_id}?"), *yes)? {
                    out.info("Cancelled");
                    return Ok(());
                }
                app.client()?.contacts().delete(contact_id).await?;
                out.success(&format!("Contact deleted: {contact_id}"));
            }

            ContactsCommand::Search { query, limit } => {
                let contacts = app
                    .client()?
                    .contacts()
                    .list(&ContactQuery {
                        limit: *limit,
                        query: Some(query.clone()),
                        all: false,
                    })
                    .await?;
                let rows = to_rows(&contacts)?;
                out.print_list(&format!("Search results for '{query}'"), &rows, &CONTACT_COLUMNS);
            }

            ContactsCommand::Tag { contact_id, tags } => {
                app.client()?.contacts().add_tags(contact_id, tags).await?;
                out.success(&format!("Tags added to contact: {}", tags.join(", ")));
            }

            ContactsCommand::Untag { contact_id, tags } => {
                app.client()?.contacts().remove_tags(contact_id, tags).await?;
                out.success(&format!("Tags removed from contact: {}", tags.join(", ")));
            }

            ContactsCommand::Notes { contact_id } => {
                let notes = app.client()?.contacts().notes(contact_id).await?;
                let rows = to_rows(&notes)?;
                out.print_list(&format!("Notes for contact {contact_id}"), &rows, &NOTE_COLUMNS);
            }

            ContactsCommand::AddNote { contact_id, note } => {
                let note = app.client()?.contacts().add_note(contact_id, note).await?;
                let id = if note.id.is_empty() { "ok" } else { note.id.as_str() };
                out.print_result(&format!("Note added: {id}"), &to_record(&note)?, &NOTE_COLUMNS);
            }

            ContactsCommand::Tasks(cmd) => cmd.execute(app).await?,
        }
        Ok(())
    }
}

impl ContactTasksCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;
        let contacts = client.contacts();

        match self {
            ContactTasksCommand::List { contact_id } => {
                let tasks = contacts.tasks(contact_id).await?;
                let rows = to_rows(&tasks)?;
                out.print_list(&format!("Tasks for contact {contact_id}"), &rows, &TASK_COLUMNS);
            }

            ContactTasksCommand::Get { contact_id, task_id } => {
                let task = contacts.task(contact_id, task_id).await?;
                out.print_record(&to_record(&task)?, &TASK_FIELDS);
            }

            ContactTasksCommand::Add {
                contact_id,
                title,
                body,
                due,
                assigned_to,
            } => {
                let task = contacts
                    .create_task(
                        contact_id,
                        &NewTask {
                            title: title.clone(),
                            body: body.clone(),
                            due_date: due.clone(),
                            completed: false,
                            assigned_to: assigned_to.clone(),
                        },
                    )
                    .await?;
                out.print_result(&format!("Task created: {}", task.id), &to_record(&task)?, &TASK_FIELDS);
            }

            ContactTasksCommand::Update {
                contact_id,
                task_id,
                title,
                body,
                due,
            } => {
                let update = TaskUpdate {
                    title: title.clone(),
                    body: body.clone(),
                    due_date: due.clone(),
                };
                if update == TaskUpdate::default() {
                    bail!("No fields to update. Specify --title, --body or --due.");
                }
                let task = contacts.update_task(contact_id, task_id, &update).await?;
                out.print_result(&format!("Task updated: {task_id}"), &to_record(&task)?, &TASK_FIELDS);
            }

            ContactTasksCommand::Complete {
                contact_id,
                task_id,
                undo,
            } => {
                let task = contacts.complete_task(contact_id, task_id, !undo).await?;
                let state = if *undo { "pending" } else { "completed" };
                out.print_result(&format!("Task {task_id} marked {state}"), &to_record(&task)?, &TASK_FIELDS);
            }

            ContactTasksCommand::Delete {
                contact_id,
                task_id,
                yes,
            } => {
                if !confirm(&format!("Delete task {task_id}?"), *yes)? {
                    out.info("Cancelled");
                    return Ok(());
                }
                contacts.delete_task(contact_id, task_id).await?;
                out.success(&format!("Task deleted: {task_id}"));
            }
        }
        Ok(())
    }
}
