//! Example schemas and documents for tests, demos and the diagnostic probe.

use serde_json::{json, Value};

use crate::schema::{FieldValue, SchemaField};

/// Blog post schema: weighted title, body text, tags and a numeric score.
pub fn blog_schema() -> Vec<SchemaField> {
    vec![
        SchemaField::text("title").weight(5.0),
        SchemaField::text("content"),
        SchemaField::tag("tags"),
        SchemaField::numeric("doc_score"),
    ]
}

pub fn sample_blog_post() -> Vec<(String, FieldValue)> {
    blog_post(
        "Redis Stack Tutorial",
        "Learn how to use Redis Stack with Python",
        "redis,python,tutorial",
        0.8,
    )
}

/// Three posts, two of which mention "Redis".
pub fn sample_blog_posts() -> Vec<Vec<(String, FieldValue)>> {
    vec![
        blog_post("Redis Tutorial", "Learn Redis basics", "redis,tutorial", 0.9),
        blog_post(
            "Python Guide",
            "Python programming with Redis",
            "python,redis",
            0.8,
        ),
        blog_post(
            "Database Design",
            "NoSQL database patterns",
            "database,nosql",
            0.7,
        ),
    ]
}

pub fn sample_user() -> Value {
    json!({
        "name": "John Doe",
        "email": "john@example.com",
        "profile": {
            "age": 30,
            "interests": ["Redis", "Python", "AI"],
        },
    })
}

fn blog_post(title: &str, content: &str, tags: &str, doc_score: f64) -> Vec<(String, FieldValue)> {
    vec![
        ("title".to_string(), title.into()),
        ("content".to_string(), content.into()),
        ("tags".to_string(), tags.into()),
        ("doc_score".to_string(), doc_score.into()),
    ]
}
