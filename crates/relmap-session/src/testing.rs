//! Models and a recording connection shared by the session tests.

use relmap_core::{
    Command, Connection, EntityBuilder, Error, Member, Model, QueryError, QueryErrorKind, Result,
    Row, Shared, Value, shared, unknown_member,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(crate) struct Person {
    pub id: i32,
    pub name: String,
}

impl Model for Person {
    fn describe(entity: &mut EntityBuilder) {
        entity.primary_key::<i32>("id").column_name("ID");
        entity.column::<String>("name").column_name("NAME");
    }

    fn get(&self, member: &str) -> Option<Member> {
        Some(match member {
            "id" => Member::value(self.id),
            "name" => Member::value(self.name.clone()),
            _ => return None,
        })
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "id" => self.id = value.into_value()?,
            "name" => self.name = value.into_value()?,
            _ => return Err(unknown_member::<Self>(member)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct Author {
    pub person: Person,
    pub books: Vec<Shared<Book>>,
}

impl Model for Author {
    fn describe(entity: &mut EntityBuilder) {
        entity.extends::<Person>();
        entity
            .many_to_many::<Book>("books", "AUTHOR_BOOK", "BOOKID")
            .column_name("AUTHORID");
    }

    fn get(&self, member: &str) -> Option<Member> {
        match member {
            "books" => Some(Member::list(&self.books)),
            _ => self.person.get(member),
        }
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "books" => self.books = value.into_list()?,
            _ => self.person.set(member, value)?,
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct Book {
    pub isbn: String,
    pub title: String,
    pub genre: Option<Shared<Genre>>,
    pub authors: Vec<Shared<Author>>,
}

impl Model for Book {
    fn describe(entity: &mut EntityBuilder) {
        entity.primary_key::<String>("isbn").column_name("ISBN");
        entity.column::<String>("title").column_name("TITLE");
        entity.reference::<Genre>("genre").column_name("GENRE_ID");
        entity
            .many_to_many::<Author>("authors", "AUTHOR_BOOK", "AUTHORID")
            .column_name("BOOKID");
    }

    fn get(&self, member: &str) -> Option<Member> {
        Some(match member {
            "isbn" => Member::value(self.isbn.clone()),
            "title" => Member::value(self.title.clone()),
            "genre" => Member::reference(&self.genre),
            "authors" => Member::list(&self.authors),
            _ => return None,
        })
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "isbn" => self.isbn = value.into_value()?,
            "title" => self.title = value.into_value()?,
            "genre" => self.genre = value.into_ref()?,
            "authors" => self.authors = value.into_list()?,
            _ => return Err(unknown_member::<Self>(member)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct Genre {
    pub id: i32,
    pub name: String,
    pub books: Vec<Shared<Book>>,
}

impl Model for Genre {
    fn describe(entity: &mut EntityBuilder) {
        entity.primary_key::<i32>("id").column_name("ID");
        entity.column::<String>("name").column_name("NAME");
        entity.one_to_many::<Book>("books").column_name("GENRE_ID");
    }

    fn get(&self, member: &str) -> Option<Member> {
        Some(match member {
            "id" => Member::value(self.id),
            "name" => Member::value(self.name.clone()),
            "books" => Member::list(&self.books),
            _ => return None,
        })
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "id" => self.id = value.into_value()?,
            "name" => self.name = value.into_value()?,
            "books" => self.books = value.into_list()?,
            _ => return Err(unknown_member::<Self>(member)),
        }
        Ok(())
    }
}

pub(crate) fn person(id: i32, name: &str) -> Shared<Person> {
    shared(Person {
        id,
        name: name.to_string(),
    })
}

pub(crate) fn author(id: i32, name: &str) -> Shared<Author> {
    shared(Author {
        person: Person {
            id,
            name: name.to_string(),
        },
        books: Vec::new(),
    })
}

pub(crate) fn book(isbn: &str, title: &str) -> Shared<Book> {
    shared(Book {
        isbn: isbn.to_string(),
        title: title.to_string(),
        ..Book::default()
    })
}

pub(crate) fn genre(id: i32, name: &str) -> Shared<Genre> {
    shared(Genre {
        id,
        name: name.to_string(),
        books: Vec::new(),
    })
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub executed: Vec<Command>,
    pub queried: Vec<Command>,
    /// Canned result sets, matched by a fragment of the query SQL.
    pub rows: Vec<(String, Vec<Row>)>,
    /// Fail any statement containing this fragment.
    pub fail_on: Option<String>,
}

impl MockState {
    pub(crate) fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(Command::sql).collect()
    }
}

/// Connection that records every command and answers queries from canned
/// rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingConnection {
    pub state: Arc<Mutex<MockState>>,
}

impl RecordingConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, fragment: &str, rows: Vec<Row>) {
        self.state
            .lock()
            .unwrap()
            .rows
            .push((fragment.to_string(), rows));
    }

    pub(crate) fn fail_on(&self, fragment: &str) {
        self.state.lock().unwrap().fail_on = Some(fragment.to_string());
    }

    pub(crate) fn execute_count(&self) -> usize {
        self.state.lock().unwrap().executed.len()
    }

    pub(crate) fn query_count(&self) -> usize {
        self.state.lock().unwrap().queried.len()
    }

    fn check(state: &MockState, command: &Command) -> Result<()> {
        match &state.fail_on {
            Some(fragment) if command.sql().contains(fragment.as_str()) => {
                Err(Error::Query(QueryError {
                    kind: QueryErrorKind::Constraint,
                    sql: Some(command.sql().to_string()),
                    sqlstate: Some("23503".to_string()),
                    message: "FOREIGN KEY constraint failed".to_string(),
                    source: None,
                }))
            }
            _ => Ok(()),
        }
    }
}

impl Connection for RecordingConnection {
    fn execute(&self, command: &Command) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        Self::check(&state, command)?;
        state.executed.push(command.clone());
        Ok(1)
    }

    fn query(&self, command: &Command) -> Result<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        Self::check(&state, command)?;
        state.queried.push(command.clone());
        Ok(state
            .rows
            .iter()
            .find(|(fragment, _)| command.sql().contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

pub(crate) fn row(columns: &[(&str, Value)]) -> Row {
    Row::new(
        columns.iter().map(|(name, _)| (*name).to_string()).collect(),
        columns.iter().map(|(_, value)| value.clone()).collect(),
    )
}
