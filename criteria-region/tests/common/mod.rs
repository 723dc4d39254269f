//! Shared fixtures: a keyed entity, an unkeyed one and a hand-written
//! criteria root for the keyed entity

#![allow(dead_code)]

use criteria_core::{
    ComparableCriteria, Criteria, CriteriaContext, CriteriaState, Entity, Identity,
    OptionalCriteria, Path, StringCriteria, Value,
};
use criteria_region::{MemoryRegion, Region, RegionBackend};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub age: i32,
    pub nickname: Option<String>,
}

impl Person {
    pub fn new(id: &str, name: &str, age: i32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            age,
            nickname: None,
        }
    }

    pub fn with_nickname(mut self, nickname: &str) -> Self {
        self.nickname = Some(nickname.to_string());
        self
    }
}

impl Entity for Person {
    fn type_name() -> &'static str {
        "Person"
    }

    fn identity() -> Option<Identity<Self>> {
        Some(Identity::new(Path::of("id"), |p| Value::from(p.id.as_str())))
    }
}

/// Entity without an identity declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
}

impl Entity for Note {
    fn type_name() -> &'static str {
        "Note"
    }
}

#[derive(Debug)]
pub struct PersonCriteria {
    state: CriteriaState,
    pub id: StringCriteria<PersonCriteria>,
    pub name: StringCriteria<PersonCriteria>,
    pub age: ComparableCriteria<PersonCriteria, i32>,
    pub nickname: OptionalCriteria<PersonCriteria, String>,
}

impl Criteria for PersonCriteria {
    fn from_state(state: CriteriaState) -> Self {
        let context = CriteriaContext::root(state.clone(), PersonCriteria::from_state);
        Self {
            id: StringCriteria::creator()(context.attribute("id")),
            name: StringCriteria::creator()(context.attribute("name")),
            age: ComparableCriteria::creator()(context.attribute("age")),
            nickname: OptionalCriteria::creator()(context.attribute("nickname")),
            state,
        }
    }

    fn state(&self) -> &CriteriaState {
        &self.state
    }

    fn into_state(self) -> CriteriaState {
        self.state
    }
}

pub fn person() -> PersonCriteria {
    PersonCriteria::from_state(CriteriaState::new())
}

pub fn people() -> Vec<Person> {
    vec![
        Person::new("a", "Ann", 30).with_nickname("Annie"),
        Person::new("b", "Bob", 17),
        Person::new("c", "Cid", 45),
    ]
}

/// Region at `/people` and a backend over it
pub fn backend() -> (MemoryRegion, RegionBackend<Person>) {
    let region = MemoryRegion::new("people");
    let backend = RegionBackend::new(Arc::new(region.clone()) as Arc<dyn Region>);
    (region, backend)
}

/// Region at `/people` pre-filled with [`people`]
pub fn populated() -> (MemoryRegion, RegionBackend<Person>) {
    let (region, backend) = backend();
    let entries = people()
        .into_iter()
        .map(|p| {
            let key = Value::from(p.id.as_str());
            (key, criteria_core::entity::to_value(&p).unwrap())
        })
        .collect();
    region.put_all(entries).unwrap();
    (region, backend)
}

pub fn ids(people: &[Person]) -> Vec<&str> {
    people.iter().map(|p| p.id.as_str()).collect()
}
