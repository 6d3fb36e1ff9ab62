//! Built-in page and database templates.

use std::sync::LazyLock;

use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::domain::{
    Block, Database, DatabaseItem, DatabaseView, NewBlock, NewDatabase, NewItem, NewPage, NewView,
    Page, ViewType,
};
use crate::store::{StoreResult, databases, pages};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    Productivity,
    Planning,
    Personal,
    Creative,
    Business,
}

/// One entry of a page template. Lists become one block per item.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateBlock {
    Heading { level: u8, content: &'static str },
    Paragraph { content: &'static str },
    BulletList { items: &'static [&'static str] },
    TaskList { items: &'static [&'static str] },
    CodeBlock { content: &'static str },
    Divider,
}

impl TemplateBlock {
    /// Block type and content for each block this entry expands to.
    fn expand(&self) -> Vec<(&'static str, Value)> {
        match *self {
            Self::Heading { level, content } => vec![("heading", json!({"text": content, "level": level}))],
            Self::Paragraph { content } => vec![("paragraph", json!({"text": content}))],
            Self::BulletList { items } => items
                .iter()
                .map(|item| ("bulletListItem", json!({"text": item})))
                .collect(),
            Self::TaskList { items } => items
                .iter()
                .map(|item| ("taskItem", json!({"text": item, "checked": false})))
                .collect(),
            Self::CodeBlock { content } => vec![("codeBlock", json!({"text": content}))],
            Self::Divider => vec![("divider", json!({}))],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageTemplate {
    pub id: &'static str,
    pub title: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub category: TemplateCategory,
    pub content: &'static [TemplateBlock],
}

use TemplateBlock::{BulletList, Heading, Paragraph, TaskList};

pub static PAGE_TEMPLATES: &[PageTemplate] = &[
    PageTemplate {
        id: "meeting-notes",
        title: "Meeting Notes",
        icon: "📝",
        description: "Structured template for capturing meeting discussions, decisions, and action items",
        category: TemplateCategory::Productivity,
        content: &[
            Heading { level: 1, content: "Meeting Notes" },
            Heading { level: 2, content: "📅 Meeting Details" },
            BulletList { items: &["Date: ", "Attendees: ", "Duration: "] },
            Heading { level: 2, content: "🎯 Agenda" },
            BulletList { items: &["Topic 1", "Topic 2", "Topic 3"] },
            Heading { level: 2, content: "💬 Discussion Notes" },
            Paragraph { content: "Key points discussed..." },
            Heading { level: 2, content: "✅ Decisions Made" },
            BulletList { items: &["Decision 1", "Decision 2"] },
            Heading { level: 2, content: "🚀 Action Items" },
            TaskList { items: &["Action item 1 - @assignee", "Action item 2 - @assignee"] },
        ],
    },
    PageTemplate {
        id: "project-plan",
        title: "Project Plan",
        icon: "📊",
        description: "Comprehensive project planning template with goals, timeline, and resources",
        category: TemplateCategory::Planning,
        content: &[
            Heading { level: 1, content: "Project Plan" },
            Heading { level: 2, content: "🎯 Project Overview" },
            Paragraph { content: "Brief description of the project..." },
            Heading { level: 2, content: "🎪 Goals & Objectives" },
            BulletList { items: &["Goal 1: ", "Goal 2: ", "Goal 3: "] },
            Heading { level: 2, content: "📅 Timeline" },
            BulletList { items: &["Phase 1: ", "Phase 2: ", "Phase 3: "] },
            Heading { level: 2, content: "👥 Team & Resources" },
            BulletList { items: &["Team member 1 - Role", "Team member 2 - Role"] },
            Heading { level: 2, content: "⚠️ Risks & Mitigation" },
            BulletList { items: &["Risk 1 → Mitigation strategy", "Risk 2 → Mitigation strategy"] },
            Heading { level: 2, content: "📈 Success Metrics" },
            BulletList { items: &["Metric 1: ", "Metric 2: "] },
        ],
    },
    PageTemplate {
        id: "daily-journal",
        title: "Daily Journal",
        icon: "📔",
        description: "Daily reflection template for gratitude, goals, and personal growth",
        category: TemplateCategory::Personal,
        content: &[
            Heading { level: 1, content: "Daily Journal - [Date]" },
            Heading { level: 2, content: "🌅 Morning Reflection" },
            Paragraph { content: "How am I feeling today?" },
            Heading { level: 2, content: "🎯 Today's Priorities" },
            TaskList { items: &["Priority 1", "Priority 2", "Priority 3"] },
            Heading { level: 2, content: "🙏 Gratitude" },
            BulletList { items: &["I'm grateful for...", "I'm grateful for...", "I'm grateful for..."] },
            Heading { level: 2, content: "💭 Thoughts & Ideas" },
            Paragraph { content: "Free writing space..." },
            Heading { level: 2, content: "🌙 Evening Reflection" },
            Paragraph { content: "What went well today?" },
            Paragraph { content: "What could I improve tomorrow?" },
        ],
    },
    PageTemplate {
        id: "task-list",
        title: "Task List",
        icon: "✅",
        description: "Simple task list with categories and priorities",
        category: TemplateCategory::Productivity,
        content: &[
            Heading { level: 1, content: "Tasks" },
            Heading { level: 2, content: "🔥 High Priority" },
            TaskList { items: &["Urgent task 1", "Urgent task 2"] },
            Heading { level: 2, content: "📌 Medium Priority" },
            TaskList { items: &["Important task 1", "Important task 2"] },
            Heading { level: 2, content: "💡 Low Priority" },
            TaskList { items: &["Nice to have 1", "Nice to have 2"] },
            Heading { level: 2, content: "✅ Completed" },
            TaskList { items: &[] },
        ],
    },
    PageTemplate {
        id: "brainstorming",
        title: "Brainstorming Session",
        icon: "💡",
        description: "Creative brainstorming template for generating and organizing ideas",
        category: TemplateCategory::Creative,
        content: &[
            Heading { level: 1, content: "Brainstorming: [Topic]" },
            Heading { level: 2, content: "🎯 Challenge/Question" },
            Paragraph { content: "What problem are we solving?" },
            Heading { level: 2, content: "💡 Ideas" },
            BulletList { items: &["Idea 1", "Idea 2", "Idea 3", "Idea 4", "Idea 5"] },
            Heading { level: 2, content: "⭐ Top Ideas" },
            BulletList { items: &["Best idea 1 - Why it works", "Best idea 2 - Why it works"] },
            TemplateBlock::Divider,
            Heading { level: 2, content: "🚀 Next Steps" },
            TaskList { items: &["Research idea 1", "Prototype idea 2", "Get feedback"] },
        ],
    },
    PageTemplate {
        id: "weekly-review",
        title: "Weekly Review",
        icon: "📆",
        description: "Weekly reflection and planning template",
        category: TemplateCategory::Planning,
        content: &[
            Heading { level: 1, content: "Weekly Review - Week of [Date]" },
            Heading { level: 2, content: "🎯 Last Week's Goals" },
            TaskList { items: &["Goal 1", "Goal 2", "Goal 3"] },
            Heading { level: 2, content: "🏆 Wins & Achievements" },
            BulletList { items: &["Win 1", "Win 2", "Win 3"] },
            Heading { level: 2, content: "📚 Lessons Learned" },
            BulletList { items: &["Lesson 1", "Lesson 2"] },
            Heading { level: 2, content: "🔮 Next Week's Focus" },
            BulletList { items: &["Focus area 1", "Focus area 2", "Focus area 3"] },
            Heading { level: 2, content: "⚡ Action Items" },
            TaskList { items: &["Action 1", "Action 2", "Action 3"] },
        ],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    Text,
    Number,
    Select,
    MultiSelect,
    Date,
    Checkbox,
    Url,
    Email,
    Phone,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateProperty {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [&'static str],
}

fn no_options(options: &&'static [&'static str]) -> bool {
    options.is_empty()
}

const fn prop(name: &'static str, property_type: PropertyType) -> TemplateProperty {
    TemplateProperty {
        name,
        property_type,
        options: &[],
    }
}

const fn choice(name: &'static str, property_type: PropertyType, options: &'static [&'static str]) -> TemplateProperty {
    TemplateProperty {
        name,
        property_type,
        options,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: TemplateCategory,
    pub properties: Vec<TemplateProperty>,
    /// Rows keyed by property name.
    pub sample_data: Vec<Value>,
}

impl DatabaseTemplate {
    /// Property id for the property at `index`.
    pub fn property_id(index: usize) -> String {
        format!("prop_{}", index + 1)
    }

    /// Schema stored on the created database. The first property is the
    /// required title column.
    pub fn schema(&self) -> Value {
        let properties: Vec<Value> = self
            .properties
            .iter()
            .enumerate()
            .map(|(idx, property)| {
                let mut entry = json!({
                    "id": Self::property_id(idx),
                    "name": property.name,
                    "type": property.property_type,
                    "required": idx == 0,
                });
                if !property.options.is_empty() {
                    entry["options"] = json!(property.options);
                }
                entry
            })
            .collect();
        json!({ "properties": properties })
    }

    /// Re-keys a sample row by property id. The first property's value is
    /// also stored as `title` so the row has a display name.
    pub fn item_properties(&self, sample: &Value) -> Value {
        let mut row = Map::new();
        for (idx, property) in self.properties.iter().enumerate() {
            if let Some(value) = sample.get(property.name) {
                row.insert(Self::property_id(idx), value.clone());
                if idx == 0 && value.is_string() {
                    row.insert("title".to_string(), value.clone());
                }
            }
        }
        Value::Object(row)
    }
}

use PropertyType::{Checkbox, Date, MultiSelect, Number, Select, Text, Url};

pub static DATABASE_TEMPLATES: LazyLock<Vec<DatabaseTemplate>> = LazyLock::new(|| {
    vec![
        DatabaseTemplate {
            id: "project-tracker",
            name: "Project Tracker",
            description: "Track projects with status, priority, and deadlines",
            icon: "📊",
            category: TemplateCategory::Productivity,
            properties: vec![
                prop("Project Name", Text),
                choice("Status", Select, &["Not Started", "In Progress", "On Hold", "Completed"]),
                choice("Priority", Select, &["Low", "Medium", "High", "Urgent"]),
                prop("Start Date", Date),
                prop("Due Date", Date),
                prop("Owner", Text),
                prop("Budget", Number),
                prop("Notes", Text),
            ],
            sample_data: vec![json!({
                "Project Name": "Website Redesign",
                "Status": "In Progress",
                "Priority": "High",
                "Start Date": "2025-01-01T00:00:00.000Z",
                "Due Date": "2025-03-31T00:00:00.000Z",
                "Owner": "Design Team",
                "Budget": 50000,
                "Notes": "Focus on mobile-first approach"
            })],
        },
        DatabaseTemplate {
            id: "habit-tracker",
            name: "Habit Tracker",
            description: "Build and maintain daily habits with streak tracking",
            icon: "✅",
            category: TemplateCategory::Personal,
            properties: vec![
                prop("Habit", Text),
                choice("Category", Select, &["Health", "Productivity", "Learning", "Social", "Creative"]),
                choice("Frequency", Select, &["Daily", "Weekly", "Monthly"]),
                prop("Current Streak", Number),
                prop("Best Streak", Number),
                prop("Start Date", Date),
                prop("Active", Checkbox),
                prop("Notes", Text),
            ],
            sample_data: vec![json!({
                "Habit": "Morning Exercise",
                "Category": "Health",
                "Frequency": "Daily",
                "Current Streak": 7,
                "Best Streak": 30,
                "Start Date": "2025-01-01T00:00:00.000Z",
                "Active": true,
                "Notes": "30 minutes of cardio"
            })],
        },
        DatabaseTemplate {
            id: "reading-list",
            name: "Reading List",
            description: "Track books you want to read and have read",
            icon: "📚",
            category: TemplateCategory::Personal,
            properties: vec![
                prop("Title", Text),
                prop("Author", Text),
                choice("Status", Select, &["Want to Read", "Reading", "Completed", "Abandoned"]),
                choice(
                    "Genre",
                    MultiSelect,
                    &["Fiction", "Non-Fiction", "Biography", "Science", "History", "Self-Help", "Business"],
                ),
                choice("Rating", Select, &["⭐", "⭐⭐", "⭐⭐⭐", "⭐⭐⭐⭐", "⭐⭐⭐⭐⭐"]),
                prop("Pages", Number),
                prop("Started", Date),
                prop("Finished", Date),
                prop("Notes", Text),
            ],
            sample_data: vec![json!({
                "Title": "Atomic Habits",
                "Author": "James Clear",
                "Status": "Completed",
                "Genre": ["Self-Help", "Non-Fiction"],
                "Rating": "⭐⭐⭐⭐⭐",
                "Pages": 320,
                "Started": "2024-12-01T00:00:00.000Z",
                "Finished": "2024-12-15T00:00:00.000Z",
                "Notes": "Excellent framework for building habits"
            })],
        },
        DatabaseTemplate {
            id: "expense-tracker",
            name: "Expense Tracker",
            description: "Monitor spending and manage your budget",
            icon: "💰",
            category: TemplateCategory::Personal,
            properties: vec![
                prop("Description", Text),
                prop("Amount", Number),
                choice(
                    "Category",
                    Select,
                    &["Food", "Transportation", "Housing", "Entertainment", "Healthcare", "Shopping", "Utilities", "Other"],
                ),
                prop("Date", Date),
                choice(
                    "Payment Method",
                    Select,
                    &["Cash", "Credit Card", "Debit Card", "Bank Transfer", "Digital Wallet"],
                ),
                prop("Recurring", Checkbox),
                prop("Vendor", Text),
                prop("Notes", Text),
            ],
            sample_data: vec![json!({
                "Description": "Grocery Shopping",
                "Amount": 150.5,
                "Category": "Food",
                "Payment Method": "Credit Card",
                "Recurring": false,
                "Vendor": "Whole Foods",
                "Notes": "Weekly groceries"
            })],
        },
        DatabaseTemplate {
            id: "contact-manager",
            name: "Contact Manager",
            description: "Organize contacts with tags and notes",
            icon: "👥",
            category: TemplateCategory::Business,
            properties: vec![
                prop("Name", Text),
                prop("Email", PropertyType::Email),
                prop("Phone", PropertyType::Phone),
                prop("Company", Text),
                prop("Role", Text),
                choice("Tags", MultiSelect, &["Client", "Vendor", "Partner", "Friend", "Family", "Colleague"]),
                prop("Last Contact", Date),
                prop("LinkedIn", Url),
                prop("Notes", Text),
            ],
            sample_data: vec![json!({
                "Name": "John Doe",
                "Email": "john@example.com",
                "Phone": "+1-555-0123",
                "Company": "Acme Corp",
                "Role": "Product Manager",
                "Tags": ["Client", "Partner"],
                "LinkedIn": "https://linkedin.com/in/johndoe",
                "Notes": "Met at conference"
            })],
        },
        DatabaseTemplate {
            id: "content-calendar",
            name: "Content Calendar",
            description: "Plan and schedule content across platforms",
            icon: "📅",
            category: TemplateCategory::Creative,
            properties: vec![
                prop("Title", Text),
                choice(
                    "Platform",
                    MultiSelect,
                    &["Blog", "Twitter", "LinkedIn", "Instagram", "YouTube", "TikTok", "Facebook"],
                ),
                choice("Status", Select, &["Idea", "Drafting", "Review", "Scheduled", "Published"]),
                choice(
                    "Content Type",
                    Select,
                    &["Article", "Video", "Image", "Infographic", "Podcast", "Story"],
                ),
                prop("Publish Date", Date),
                prop("Author", Text),
                choice("Tags", MultiSelect, &["Tutorial", "News", "Opinion", "Review", "Case Study", "How-To"]),
                prop("URL", Url),
                prop("Notes", Text),
            ],
            sample_data: vec![json!({
                "Title": "10 Productivity Tips for Remote Workers",
                "Platform": ["Blog", "LinkedIn"],
                "Status": "Drafting",
                "Content Type": "Article",
                "Publish Date": "2025-02-01T00:00:00.000Z",
                "Author": "Content Team",
                "Tags": ["How-To", "Tutorial"],
                "URL": "",
                "Notes": "Include infographics"
            })],
        },
        DatabaseTemplate {
            id: "job-applications",
            name: "Job Applications",
            description: "Track job applications and interview progress",
            icon: "💼",
            category: TemplateCategory::Business,
            properties: vec![
                prop("Company", Text),
                prop("Position", Text),
                choice(
                    "Status",
                    Select,
                    &["Applied", "Phone Screen", "Interview", "Offer", "Rejected", "Accepted", "Declined"],
                ),
                prop("Applied Date", Date),
                prop("Salary Range", Text),
                prop("Location", Text),
                prop("Remote", Checkbox),
                prop("Job URL", Url),
                prop("Contact", Text),
                prop("Notes", Text),
            ],
            sample_data: vec![json!({
                "Company": "Tech Startup Inc",
                "Position": "Senior Developer",
                "Status": "Interview",
                "Applied Date": "2025-01-15T00:00:00.000Z",
                "Salary Range": "$120k - $150k",
                "Location": "San Francisco, CA",
                "Remote": true,
                "Job URL": "https://example.com/jobs/123",
                "Contact": "Jane Smith - HR",
                "Notes": "Second round interview scheduled"
            })],
        },
    ]
});

pub fn page_template(id: &str) -> Option<&'static PageTemplate> {
    PAGE_TEMPLATES.iter().find(|template| template.id == id)
}

pub fn database_template(id: &str) -> Option<&'static DatabaseTemplate> {
    DATABASE_TEMPLATES.iter().find(|template| template.id == id)
}

/// Creates a page from `template` with one block per expanded entry.
pub fn instantiate_page(
    conn: &Connection,
    user_id: i64,
    template: &PageTemplate,
    workspace_id: i64,
    parent_id: Option<i64>,
    title: Option<String>,
) -> StoreResult<(Page, Vec<Block>)> {
    let page = pages::create_page(
        conn,
        user_id,
        &NewPage {
            workspace_id,
            parent_id,
            title: title.unwrap_or_else(|| template.title.to_string()),
            icon: Some(template.icon.to_string()),
            cover_image: None,
            position: None,
        },
    )?;

    let mut blocks = Vec::new();
    for (position, (block_type, content)) in template
        .content
        .iter()
        .flat_map(TemplateBlock::expand)
        .enumerate()
    {
        blocks.push(pages::create_block(
            conn,
            user_id,
            &NewBlock {
                page_id: page.id,
                parent_block_id: None,
                block_type: block_type.to_string(),
                content,
                position: Some(i64::try_from(position).unwrap_or(i64::MAX)),
            },
        )?);
    }
    Ok((page, blocks))
}

/// A database created from a template.
#[derive(Debug, Clone, Serialize)]
pub struct InstantiatedDatabase {
    pub database: Database,
    pub view: DatabaseView,
    pub items: Vec<DatabaseItem>,
}

/// Creates the database, a default table view and the sample rows.
pub fn instantiate_database(
    conn: &Connection,
    user_id: i64,
    template: &DatabaseTemplate,
    workspace_id: i64,
    name: Option<String>,
) -> StoreResult<InstantiatedDatabase> {
    let database = databases::create_database(
        conn,
        user_id,
        &NewDatabase {
            workspace_id,
            name: name.unwrap_or_else(|| template.name.to_string()),
            icon: Some(template.icon.to_string()),
            description: Some(template.description.to_string()),
            schema: template.schema(),
        },
    )?;

    let view = databases::create_view(
        conn,
        user_id,
        &NewView {
            database_id: database.id,
            name: "Table".to_string(),
            view_type: ViewType::Table,
            config: json!({}),
            position: Some(0),
        },
    )?;

    let items = template
        .sample_data
        .iter()
        .map(|sample| {
            databases::create_item(
                conn,
                user_id,
                &NewItem {
                    database_id: database.id,
                    properties: template.item_properties(sample),
                    position: None,
                },
            )
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(InstantiatedDatabase {
        database,
        view,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support;

    #[test]
    fn catalogue_ids_are_unique() {
        assert_eq!(PAGE_TEMPLATES.len(), 6);
        assert_eq!(DATABASE_TEMPLATES.len(), 7);
        let mut ids: Vec<_> = PAGE_TEMPLATES.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert!(page_template("weekly-review").is_some());
        assert!(database_template("nope").is_none());
    }

    #[test]
    fn page_template_expands_lists_into_blocks() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let template = page_template("task-list").unwrap();

        let (page, blocks) = instantiate_page(&conn, user.id, template, ws.id, None, None).unwrap();
        assert_eq!(page.title, "Task List");
        assert_eq!(page.icon.as_deref(), Some("✅"));
        // 5 headings + 6 tasks; the empty "Completed" list adds nothing.
        assert_eq!(blocks.len(), 11);
        assert_eq!(blocks[2].block_type, "taskItem");
        assert_eq!(blocks[2].content["checked"], false);
        let positions: Vec<i64> = blocks.iter().map(|b| b.position).collect();
        assert_eq!(positions, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn database_template_builds_schema_view_and_rows() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "u");
        let ws = test_support::workspace(&conn, &user);
        let template = database_template("reading-list").unwrap();

        let created =
            instantiate_database(&conn, user.id, template, ws.id, Some("Books".to_string())).unwrap();
        assert_eq!(created.database.name, "Books");
        let props = created.database.schema["properties"].as_array().unwrap();
        assert_eq!(props.len(), 9);
        assert_eq!(props[0]["id"], "prop_1");
        assert_eq!(props[0]["required"], true);
        assert_eq!(props[3]["type"], "multiSelect");
        assert_eq!(created.view.view_type, ViewType::Table);

        let item = &created.items[0];
        assert_eq!(item.properties["prop_1"], "Atomic Habits");
        assert_eq!(item.properties["prop_4"], json!(["Self-Help", "Non-Fiction"]));
        assert_eq!(item.title(), "Atomic Habits");
    }
}
