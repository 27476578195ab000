use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Field, Shape, UrlResolver};
use crate::query::{FieldSelection, FilterRequest, Loaded};

/// Field selections for one level of a shaped graph.
///
/// A level's own `fields` (top-level `fields`, or `relation_params` for a
/// relation) wins; otherwise the `<type>_resource` selection applies.
#[derive(Debug, Clone, Default)]
pub struct ShapePlan {
    fields: Option<FieldSelection>,
    by_type: Arc<BTreeMap<String, FieldSelection>>,
    relations: BTreeMap<String, ShapePlan>,
}

impl ShapePlan {
    pub fn from_request(request: &FilterRequest) -> Self {
        let by_type = Arc::new(request.resource_fields.clone());
        Self::nested(request, request.fields.clone(), &by_type)
    }

    fn nested(
        request: &FilterRequest,
        fields: Option<FieldSelection>,
        by_type: &Arc<BTreeMap<String, FieldSelection>>,
    ) -> Self {
        Self {
            fields,
            by_type: by_type.clone(),
            relations: request
                .relations
                .iter()
                .map(|(name, nested)| {
                    (name.clone(), Self::nested(nested, nested.fields.clone(), by_type))
                })
                .collect(),
        }
    }

    fn child(&self, relation: &str) -> ShapePlan {
        self.relations.get(relation).cloned().unwrap_or_else(|| ShapePlan {
            by_type: self.by_type.clone(),
            ..Default::default()
        })
    }

    fn selection_for(&self, type_name: &str) -> Option<&FieldSelection> {
        self.fields.as_ref().or_else(|| self.by_type.get(type_name))
    }
}

/// Projects loaded entities into JSON objects.
#[derive(Clone)]
pub struct ResourceShaper {
    urls: Arc<dyn UrlResolver>,
}

impl ResourceShaper {
    pub fn new(urls: Arc<dyn UrlResolver>) -> Self {
        Self { urls }
    }

    /// Shape one entity and, recursively, its eager-loaded relations.
    ///
    /// Relations that were not loaded are omitted even when selected.
    pub fn shape(&self, entity: &dyn Shape, plan: &ShapePlan) -> Map<String, Value> {
        let selection = plan.selection_for(entity.type_name());
        let selected = |name: &str| selection.is_none_or(|s| s.contains(name));
        let loaded = entity.loaded_relations();

        let mut out = Map::new();
        for (name, field) in entity.resource_fields(self.urls.as_ref()) {
            if !selected(name) {
                continue;
            }
            let value = match field {
                Field::Value(value) => value,
                Field::Relation => match loaded.get(name) {
                    None => continue,
                    Some(Loaded::One(None)) => Value::Null,
                    Some(Loaded::One(Some(child))) => {
                        Value::Object(self.shape(child.as_ref(), &plan.child(name)))
                    }
                    Some(Loaded::Many(children)) => {
                        let child_plan = plan.child(name);
                        Value::Array(
                            children
                                .iter()
                                .map(|c| Value::Object(self.shape(c.as_ref(), &child_plan)))
                                .collect(),
                        )
                    }
                },
            };
            out.insert(name.to_string(), value);
        }

        for (relation, count) in loaded.exposed_counts() {
            let key = format!("{relation}_count");
            if selected(&key) {
                out.insert(key, Value::from(count));
            }
        }
        out
    }

    pub fn shape_many<'a, I, S>(&self, entities: I, plan: &ShapePlan) -> Vec<Value>
    where
        I: IntoIterator<Item = &'a S>,
        S: Shape + 'a,
    {
        entities
            .into_iter()
            .map(|e| Value::Object(self.shape(e, plan)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::entities::Course;
    use crate::query::{ParamBag, QueryComposer, RequestContext};
    use crate::resource::PublicStorage;
    use pretty_assertions::assert_eq;

    fn request(query: &str) -> FilterRequest {
        FilterRequest::from_params(&ParamBag::from_query(query))
    }

    fn shaper() -> ResourceShaper {
        ResourceShaper::new(Arc::new(PublicStorage::new("/storage")))
    }

    async fn course(query: &str) -> (Course, FilterRequest) {
        let db = Database::in_memory().await.unwrap();
        crate::db::seed::seed_demo_data(db.pool()).await.unwrap();
        let request = request(query);
        let course = QueryComposer::<Course>::new()
            .find(db.pool(), 1, &request, &RequestContext::anonymous())
            .await
            .unwrap();
        (course, request)
    }

    fn keys(map: &Map<String, Value>) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn test_selection_drops_loaded_relation() {
        let (course, request) = course("relations=classroom&course_resource=id,name").await;
        let out = shaper().shape(&course, &ShapePlan::from_request(&request));
        assert_eq!(keys(&out), vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_top_level_fields_select_root() {
        let (course, request) = course("fields=id,name&course_resource=id,description").await;
        let out = shaper().shape(&course, &ShapePlan::from_request(&request));
        assert_eq!(keys(&out), vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_no_selection_nests_relation() {
        let (course, request) = course("relations=classroom").await;
        let out = shaper().shape(&course, &ShapePlan::from_request(&request));
        let classroom = out["classroom"].as_object().unwrap();
        assert_eq!(classroom["name"], "Class 1A");
        assert!(classroom.contains_key("deletable"));
        assert_eq!(out["deletable"], false);
    }

    #[tokio::test]
    async fn test_unloaded_relation_is_omitted() {
        let (course, request) = course("course_resource=id,classroom,teacher").await;
        let out = shaper().shape(&course, &ShapePlan::from_request(&request));
        assert_eq!(keys(&out), vec!["id"]);
    }

    #[tokio::test]
    async fn test_nested_selections() {
        let (course, request) = course(
            "relations=classroom.school,teacher\
             &class_room_resource=id,school\
             &relation_params[teacher][fields]=id,username",
        )
        .await;
        let out = shaper().shape(&course, &ShapePlan::from_request(&request));

        let classroom = out["classroom"].as_object().unwrap();
        assert_eq!(keys(classroom), vec!["id", "school"]);
        assert!(classroom["school"].as_object().unwrap().contains_key("address"));

        let teacher = out["teacher"].as_object().unwrap();
        assert_eq!(keys(teacher), vec!["id", "username"]);
    }

    #[tokio::test]
    async fn test_shaping_is_idempotent_and_selection_is_subset() {
        let (course, request) = course("relations=classroom&relations_count=learning_materials").await;
        let shaper = shaper();
        let full_plan = ShapePlan::from_request(&request);
        let first = shaper.shape(&course, &full_plan);
        let second = shaper.shape(&course, &full_plan);
        assert_eq!(first, second);
        assert_eq!(first["learning_materials_count"], 2);

        let mut narrow = request.clone();
        narrow.resource_fields.insert(
            "course".to_string(),
            FieldSelection::parse("id,description,unknown").unwrap(),
        );
        let subset = shaper.shape(&course, &ShapePlan::from_request(&narrow));
        assert!(subset.keys().all(|k| first.contains_key(k)));
        assert_eq!(keys(&subset), vec!["id", "description"]);
    }
}
