//! Category grouping
//!
//! An entity with N categories lands in N groups. Entities without any
//! category go to one trailing uncategorized group, so nothing is dropped.

use std::collections::HashMap;

use storesync_core::{Category, Entity, FetchResult};

/// Entities sharing one category, in fetch order.
#[derive(Debug)]
pub struct CategoryGroup<'a> {
    /// `None` for the uncategorized group
    pub category: Option<&'a Category>,
    pub entities: Vec<&'a Entity>,
}

impl CategoryGroup<'_> {
    /// Title before sanitization.
    pub fn raw_title(&self, uncategorized: &str) -> String {
        match self.category {
            Some(c) if !c.name.trim().is_empty() => c.name.clone(),
            Some(c) => format!("Category {}", c.id),
            None => uncategorized.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Group by category id; groups ordered by first appearance, uncategorized last.
pub fn group_by_category(result: &FetchResult) -> Vec<CategoryGroup<'_>> {
    let mut groups: Vec<CategoryGroup<'_>> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut uncategorized: Vec<&Entity> = Vec::new();

    for entity in &result.entities {
        if entity.categories.is_empty() {
            uncategorized.push(entity);
            continue;
        }
        for category in &entity.categories {
            let slot = *index.entry(category.id).or_insert_with(|| {
                groups.push(CategoryGroup {
                    category: Some(category),
                    entities: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].entities.push(entity);
        }
    }

    if !uncategorized.is_empty() {
        groups.push(CategoryGroup {
            category: None,
            entities: uncategorized,
        });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: i64, cats: &[(i64, &str)]) -> Entity {
        let categories: Vec<_> = cats
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect();
        Entity::from_json(json!({"id": id, "name": format!("E{id}"), "categories": categories}))
            .unwrap()
    }

    fn result(entities: Vec<Entity>) -> FetchResult {
        FetchResult {
            resource: "products".into(),
            entities,
            pages: 1,
            reported_total: None,
        }
    }

    #[test]
    fn multi_category_entities_are_duplicated() {
        let r = result(vec![
            entity(1, &[(10, "Shoes"), (20, "Sale")]),
            entity(2, &[(20, "Sale")]),
            entity(3, &[]),
        ]);
        let groups = group_by_category(&r);

        let summary: Vec<(String, Vec<i64>)> = groups
            .iter()
            .map(|g| (g.raw_title("Uncategorized"), g.entities.iter().map(|e| e.id).collect()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Shoes".to_string(), vec![1]),
                ("Sale".to_string(), vec![1, 2]),
                ("Uncategorized".to_string(), vec![3]),
            ]
        );
    }

    #[test]
    fn no_uncategorized_group_when_unneeded() {
        let r = result(vec![entity(1, &[(10, "Shoes")])]);
        let groups = group_by_category(&r);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].category.is_some());
    }

    #[test]
    fn same_name_different_ids_stay_apart() {
        let r = result(vec![entity(1, &[(1, "Misc")]), entity(2, &[(2, "Misc")])]);
        assert_eq!(group_by_category(&r).len(), 2);
    }

    #[test]
    fn unnamed_category_title() {
        let r = result(vec![entity(1, &[(7, "")])]);
        assert_eq!(group_by_category(&r)[0].raw_title("Uncategorized"), "Category 7");
    }

    #[test]
    fn empty_result_has_no_groups() {
        assert!(group_by_category(&result(Vec::new())).is_empty());
    }
}
