use super::{open_db, print_json};
use crate::categorizer::categorize_unset;
use crate::error::Result;
use crate::models::Category;

pub fn run(json: bool) -> Result<()> {
    let conn = open_db()?;
    let result = categorize_unset(&conn)?;
    if json {
        return print_json(&result);
    }
    println!("{} categorized, {} still uncategorized", result.categorized, result.still_unset);
    Ok(())
}

/// Prints the category labels; works without a database.
pub fn list(json: bool) -> Result<()> {
    let labels: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
    if json {
        return print_json(&labels);
    }
    for label in labels {
        println!("{label}");
    }
    Ok(())
}
