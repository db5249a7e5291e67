//! Library domain shared by the SQLite end-to-end tests.
//!
//! `SpecialCustomer` extends `Customer` extends `Person`; authors and
//! customers link to books through junction tables, and each book belongs to
//! one genre.

#![allow(dead_code)]

use relmap::prelude::*;
use relmap::{Command, Dialect, Row};
use std::cell::Cell;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl OrdinalEnum for Gender {
    fn ordinal(&self) -> i32 {
        *self as i32
    }

    fn from_ordinal(ordinal: i32) -> Option<Self> {
        match ordinal {
            0 => Some(Gender::Male),
            1 => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Person {
    pub id: i32,
    pub name: String,
    pub surname: Option<String>,
    pub gender: Gender,
}

impl Model for Person {
    fn describe(entity: &mut EntityBuilder) {
        entity.table("BASEPERSON");
        entity.primary_key::<i32>("id").column_name("ID");
        entity.column::<String>("name").column_name("NAME");
        entity
            .column::<Option<String>>("surname")
            .column_name("SNAME")
            .db_type("TEXT");
        entity.enumeration::<Gender>("gender").column_name("GENDER");
    }

    fn get(&self, member: &str) -> Option<Member> {
        Some(match member {
            "id" => Member::value(self.id),
            "name" => Member::value(self.name.clone()),
            "surname" => Member::value(self.surname.clone()),
            "gender" => Member::ordinal(&self.gender),
            _ => return None,
        })
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "id" => self.id = value.into_value()?,
            "name" => self.name = value.into_value()?,
            "surname" => self.surname = value.into_value()?,
            "gender" => self.gender = value.into_enum()?,
            _ => return Err(unknown_member::<Self>(member)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Author {
    pub person: Person,
    pub abbreviated_name: String,
    pub books: Vec<Shared<Book>>,
}

impl Model for Author {
    fn describe(entity: &mut EntityBuilder) {
        entity.extends::<Person>();
        entity
            .column::<String>("abbreviated_name")
            .column_name("ABBREVIATED_NAME");
        entity
            .many_to_many::<Book>("books", "AUTHOR_BOOK", "BOOKID")
            .column_name("AUTHORID");
    }

    fn get(&self, member: &str) -> Option<Member> {
        match member {
            "abbreviated_name" => Some(Member::value(self.abbreviated_name.clone())),
            "books" => Some(Member::list(&self.books)),
            _ => self.person.get(member),
        }
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "abbreviated_name" => self.abbreviated_name = value.into_value()?,
            "books" => self.books = value.into_list()?,
            _ => self.person.set(member, value)?,
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Book {
    pub book_id: String,
    pub title: String,
    pub genre: Option<Shared<Genre>>,
    pub authors: Vec<Shared<Author>>,
}

impl Model for Book {
    fn describe(entity: &mut EntityBuilder) {
        entity.primary_key::<String>("book_id").column_name("BOOKID");
        entity.column::<String>("title").column_name("TITLE");
        entity.reference::<Genre>("genre").column_name("GID");
        entity
            .many_to_many::<Author>("authors", "AUTHOR_BOOK", "AUTHORID")
            .column_name("BOOKID");
    }

    fn get(&self, member: &str) -> Option<Member> {
        Some(match member {
            "book_id" => Member::value(self.book_id.clone()),
            "title" => Member::value(self.title.clone()),
            "genre" => Member::reference(&self.genre),
            "authors" => Member::list(&self.authors),
            _ => return None,
        })
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "book_id" => self.book_id = value.into_value()?,
            "title" => self.title = value.into_value()?,
            "genre" => self.genre = value.into_ref()?,
            "authors" => self.authors = value.into_list()?,
            _ => return Err(unknown_member::<Self>(member)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Genre {
    pub id: i32,
    pub name: String,
    pub books: Vec<Shared<Book>>,
}

impl Model for Genre {
    fn describe(entity: &mut EntityBuilder) {
        entity.primary_key::<i32>("id").column_name("ID");
        entity
            .column::<String>("name")
            .column_name("GNAME")
            .db_type("TEXT")
            .unique();
        entity.one_to_many::<Book>("books").column_name("GID");
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

#[derive(Debug, Default)]
pub struct Customer {
    pub person: Person,
    /// Seconds since the Unix epoch.
    pub registered_since: i64,
    pub books: Vec<Shared<Book>>,
}

impl Model for Customer {
    fn describe(entity: &mut EntityBuilder) {
        entity.table("LIBCUSTOMER");
        entity.extends::<Person>();
        entity
            .column::<i64>("registered_since")
            .column_name("REGISTERED_SINCE");
        entity
            .many_to_many::<Book>("books", "CUSTOMER_BOOK", "BOOKID")
            .column_name("CUSTOMERID");
    }

    fn get(&self, member: &str) -> Option<Member> {
        match member {
            "registered_since" => Some(Member::value(self.registered_since)),
            "books" => Some(Member::list(&self.books)),
            _ => self.person.get(member),
        }
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "registered_since" => self.registered_since = value.into_value()?,
            "books" => self.books = value.into_list()?,
            _ => self.person.set(member, value)?,
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SpecialCustomer {
    pub customer: Customer,
    pub password: String,
}

impl Model for SpecialCustomer {
    fn describe(entity: &mut EntityBuilder) {
        entity.extends::<Customer>();
        entity.column::<String>("password").column_name("PASSWORD");
    }

    fn get(&self, member: &str) -> Option<Member> {
        match member {
            "password" => Some(Member::value(self.password.clone())),
            _ => self.customer.get(member),
        }
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "password" => self.password = value.into_value()?,
            _ => self.customer.set(member, value)?,
        }
        Ok(())
    }
}

pub fn genre(id: i32, name: &str) -> Shared<Genre> {
    shared(Genre {
        id,
        name: name.to_string(),
        books: Vec::new(),
    })
}

pub fn book(book_id: &str, title: &str, genre: &Shared<Genre>) -> Shared<Book> {
    shared(Book {
        book_id: book_id.to_string(),
        title: title.to_string(),
        genre: Some(genre.clone()),
        authors: Vec::new(),
    })
}

pub fn author(id: i32, name: &str, abbreviated: &str, books: &[&Shared<Book>]) -> Shared<Author> {
    shared(Author {
        person: Person {
            id,
            name: name.to_string(),
            surname: None,
            gender: Gender::Female,
        },
        abbreviated_name: abbreviated.to_string(),
        books: books.iter().map(|b| (*b).clone()).collect(),
    })
}

pub fn special_customer(id: i32, name: &str, surname: &str) -> Shared<SpecialCustomer> {
    shared(SpecialCustomer {
        customer: Customer {
            person: Person {
                id,
                name: name.to_string(),
                surname: Some(surname.to_string()),
                gender: Gender::Male,
            },
            registered_since: 1_448_323_200,
            books: Vec::new(),
        },
        password: "Secret123".to_string(),
    })
}

/// A mapper over a fresh in-memory database holding the library schema.
pub fn library(conn: &SqliteConnection) -> Mapper<&SqliteConnection> {
    let mut mapper = Mapper::new(conn);
    mapper.register::<SpecialCustomer>().unwrap();
    mapper.ensure_created().unwrap();
    mapper
}

/// Connection wrapper counting the statements that reach the database.
pub struct CountingConnection<'a> {
    pub inner: &'a SqliteConnection,
    pub writes: Cell<usize>,
    pub reads: Cell<usize>,
}

impl<'a> CountingConnection<'a> {
    pub fn new(inner: &'a SqliteConnection) -> Self {
        Self {
            inner,
            writes: Cell::new(0),
            reads: Cell::new(0),
        }
    }
}

impl Connection for CountingConnection<'_> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn execute(&self, command: &Command) -> Result<u64> {
        self.writes.set(self.writes.get() + 1);
        self.inner.execute(command)
    }

    fn query(&self, command: &Command) -> Result<Vec<Row>> {
        self.reads.set(self.reads.get() + 1);
        self.inner.query(command)
    }
}
