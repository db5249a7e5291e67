//! Small library models shared by the builder tests.

use relmap_core::{
    EntityBuilder, Member, Model, ReferentialAction, Result, Shared, shared, unknown_member,
};

#[derive(Debug, Default)]
pub(crate) struct Person {
    pub id: i32,
    pub name: String,
    pub nick: Option<String>,
    pub active: bool,
}

impl Model for Person {
    fn describe(entity: &mut EntityBuilder) {
        entity.primary_key::<i32>("id").column_name("ID");
        entity.column::<String>("name").column_name("NAME");
        entity.column::<Option<String>>("nick").column_name("NICK");
        entity
            .column::<bool>("active")
            .column_name("ACTIVE")
            .stored_as::<i32>();
    }

    fn get(&self, member: &str) -> Option<Member> {
        Some(match member {
            "id" => Member::value(self.id),
            "name" => Member::value(self.name.clone()),
            "nick" => Member::value(self.nick.clone()),
            "active" => Member::value(self.active),
            _ => return None,
        })
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "id" => self.id = value.into_value()?,
            "name" => self.name = value.into_value()?,
            "nick" => self.nick = value.into_value()?,
            "active" => self.active = value.into_value()?,
            _ => return Err(unknown_member::<Self>(member)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct Author {
    pub person: Person,
    pub pen_name: String,
    pub books: Vec<Shared<Book>>,
}

impl Model for Author {
    fn describe(entity: &mut EntityBuilder) {
        entity.extends::<Person>();
        entity.column::<String>("pen_name").column_name("PEN_NAME");
        entity
            .many_to_many::<Book>("books", "AUTHOR_BOOK", "BOOKID")
            .column_name("AUTHORID");
    }

    fn get(&self, member: &str) -> Option<Member> {
        match member {
            "pen_name" => Some(Member::value(self.pen_name.clone())),
            "books" => Some(Member::list(&self.books)),
            _ => self.person.get(member),
        }
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "pen_name" => self.pen_name = value.into_value()?,
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
        entity
            .reference::<Genre>("genre")
            .column_name("GENRE_ID")
            .on_delete(ReferentialAction::NoAction);
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
        entity.column::<String>("name").column_name("NAME").unique();
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

#[derive(Debug, Default)]
pub(crate) struct Tag {
    pub id: i64,
}

impl Model for Tag {
    fn describe(entity: &mut EntityBuilder) {
        entity.primary_key::<i64>("id").column_name("ID");
    }

    fn get(&self, member: &str) -> Option<Member> {
        (member == "id").then(|| Member::value(self.id))
    }

    fn set(&mut self, member: &str, value: Member) -> Result<()> {
        match member {
            "id" => self.id = value.into_value()?,
            _ => return Err(unknown_member::<Self>(member)),
        }
        Ok(())
    }
}

pub(crate) fn author(id: i32, name: &str) -> Shared<Author> {
    shared(Author {
        person: Person {
            id,
            name: name.to_string(),
            nick: None,
            active: true,
        },
        pen_name: name.to_uppercase(),
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
