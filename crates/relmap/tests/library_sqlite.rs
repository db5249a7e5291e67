mod common;

use common::{
    Author, Book, CountingConnection, Gender, Genre, Person, SpecialCustomer, author, book, genre,
    library, special_customer,
};
use relmap::prelude::*;
use relmap::{QueryErrorKind, create_commands};
use std::rc::Rc;

fn stocked(conn: &SqliteConnection) -> Mapper<&SqliteConnection> {
    let mut mapper = library(conn);
    let horror = genre(1, "Horror");
    let fantasy = genre(2, "Fantasy");
    mapper.save(&horror).unwrap();
    mapper.save(&fantasy).unwrap();
    mapper.save(&book("h1", "Frankenstein", &horror)).unwrap();
    mapper.save(&book("h2", "Dracula", &horror)).unwrap();
    mapper.save(&book("f1", "Der Herr der Ringe", &fantasy)).unwrap();
    mapper.clear_cache();
    mapper
}

#[test]
fn registering_one_type_registers_the_whole_library() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = Mapper::new(&conn);
    mapper.register::<SpecialCustomer>().unwrap();

    let mut tables: Vec<&str> = mapper.entities().iter().map(|e| e.table_name()).collect();
    tables.sort_unstable();
    assert_eq!(
        tables,
        ["AUTHOR", "BASEPERSON", "BOOK", "GENRE", "LIBCUSTOMER", "SPECIALCUSTOMER"]
    );
    // Six tables plus the AUTHOR_BOOK and CUSTOMER_BOOK junctions.
    assert_eq!(create_commands(mapper.entities()).unwrap().len(), 8);

    mapper.ensure_deleted().unwrap();
    mapper.ensure_created().unwrap();
    // Creating again is harmless.
    mapper.ensure_created().unwrap();
}

#[test]
fn schema_can_be_dropped_and_recreated_in_a_transaction() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = library(&conn);
    mapper.save(&genre(1, "Horror")).unwrap();

    mapper.start_transaction().unwrap();
    mapper.ensure_deleted().unwrap();
    mapper.ensure_created().unwrap();
    mapper.commit_transaction().unwrap();

    assert!(mapper.read::<Genre>(1).unwrap().is_none());
}

#[test]
fn book_reads_back_with_its_genre() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);

    let h1 = mapper.read::<Book>("h1").unwrap().unwrap();
    let h1 = h1.borrow();
    assert_eq!(h1.title, "Frankenstein");
    let genre = h1.genre.as_ref().unwrap().borrow();
    assert_eq!(genre.name, "Horror");

    let mut titles: Vec<String> = genre.books.iter().map(|b| b.borrow().title.clone()).collect();
    titles.sort();
    assert_eq!(titles, ["Dracula", "Frankenstein"]);
}

#[test]
fn cyclic_read_keeps_one_instance_per_key() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);

    let h1 = mapper.read::<Book>("h1").unwrap().unwrap();
    let genre = h1.borrow().genre.clone().unwrap();
    let same = genre
        .borrow()
        .books
        .iter()
        .find(|b| b.borrow().book_id == "h1")
        .cloned()
        .unwrap();
    assert!(Rc::ptr_eq(&h1, &same));

    // Dracula's genre is the very same Horror instance.
    let h2 = genre
        .borrow()
        .books
        .iter()
        .find(|b| b.borrow().book_id == "h2")
        .cloned()
        .unwrap();
    assert!(Rc::ptr_eq(h2.borrow().genre.as_ref().unwrap(), &genre));

    // Cached afterwards: reading again hands back the same object.
    let again = mapper.read::<Genre>(1).unwrap().unwrap();
    assert!(Rc::ptr_eq(&again, &genre));
}

#[test]
fn deleting_a_referenced_genre_is_a_constraint_violation() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);
    let horror = mapper.read::<Genre>(1).unwrap().unwrap();

    let err = mapper.delete(&horror).unwrap_err();
    assert!(err.is_data_access());
    assert_eq!(err.sqlstate(), Some("23503"));
    match &err {
        Error::DataAccess(e) => match e.cause() {
            Error::Query(q) => assert!(q.is_foreign_key_violation()),
            other => panic!("unexpected cause: {other}"),
        },
        other => panic!("unexpected error: {other}"),
    }

    mapper.clear_cache();
    assert!(mapper.read::<Genre>(1).unwrap().is_some());
}

#[test]
fn deleting_an_unreferenced_genre_succeeds() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = library(&conn);
    let romance = genre(4, "Romance");
    mapper.save(&romance).unwrap();

    mapper.delete(&romance).unwrap();
    assert!(mapper.read::<Genre>(4).unwrap().is_none());
}

#[test]
fn many_to_many_is_visible_from_both_sides() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);
    let dracula = mapper.read::<Book>("h2").unwrap().unwrap();
    mapper
        .save(&author(3, "Bram", "B. Stoker", &[&dracula]))
        .unwrap();
    mapper.clear_cache();

    let dracula = mapper.read::<Book>("h2").unwrap().unwrap();
    let authors = &dracula.borrow().authors;
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].borrow().abbreviated_name, "B. Stoker");
    assert_eq!(authors[0].borrow().person.name, "Bram");

    mapper.clear_cache();
    let bram = mapper.read::<Author>(3).unwrap().unwrap();
    let books: Vec<String> = bram
        .borrow()
        .books
        .iter()
        .map(|b| b.borrow().book_id.clone())
        .collect();
    assert_eq!(books, ["h2"]);
}

#[test]
fn saving_an_emptied_collection_clears_the_junction() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);
    let dracula = mapper.read::<Book>("h2").unwrap().unwrap();
    let bram = author(3, "Bram", "B. Stoker", &[&dracula]);
    mapper.save(&bram).unwrap();

    bram.borrow_mut().books.clear();
    mapper.save(&bram).unwrap();
    mapper.clear_cache();

    let dracula = mapper.read::<Book>("h2").unwrap().unwrap();
    assert!(dracula.borrow().authors.is_empty());
}

#[test]
fn one_to_many_save_moves_books_between_genres() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);
    let fantasy = mapper.read::<Genre>(2).unwrap().unwrap();
    let dracula = mapper.read::<Book>("h2").unwrap().unwrap();

    fantasy.borrow_mut().books.push(dracula.clone());
    mapper.save(&fantasy).unwrap();
    // The book's back-reference is updated in memory too.
    assert!(Rc::ptr_eq(dracula.borrow().genre.as_ref().unwrap(), &fantasy));

    mapper.clear_cache();
    let dracula = mapper.read::<Book>("h2").unwrap().unwrap();
    assert_eq!(
        dracula.borrow().genre.as_ref().unwrap().borrow().name,
        "Fantasy"
    );
}

#[test]
fn unchanged_objects_are_not_written_again() {
    let sqlite = SqliteConnection::open_memory().unwrap();
    library(&sqlite);
    let conn = CountingConnection::new(&sqlite);
    let mut mapper = Mapper::new(&conn);

    let horror = genre(1, "Horror");
    mapper.save(&horror).unwrap();
    assert_eq!(conn.writes.get(), 1);

    mapper.save(&horror).unwrap();
    assert_eq!(conn.writes.get(), 1);

    horror.borrow_mut().name = "Gothic Horror".to_string();
    mapper.save(&horror).unwrap();
    assert_eq!(conn.writes.get(), 2);
}

#[test]
fn disabled_change_tracking_always_writes() {
    let sqlite = SqliteConnection::open_memory().unwrap();
    library(&sqlite);
    let conn = CountingConnection::new(&sqlite);
    let mut mapper = Mapper::with_config(&conn, MapperConfig::new().change_tracking(false));

    let horror = genre(1, "Horror");
    mapper.save(&horror).unwrap();
    mapper.save(&horror).unwrap();
    assert_eq!(conn.writes.get(), 2);
}

#[test]
fn derived_objects_round_trip_through_every_table() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);
    let daniel = special_customer(5, "Daniel", "Huber");
    let h1 = mapper.read::<Book>("h1").unwrap().unwrap();
    daniel.borrow_mut().customer.books.push(h1);
    mapper.save(&daniel).unwrap();
    mapper.clear_cache();

    let read = mapper.read::<SpecialCustomer>(5).unwrap().unwrap();
    let read = read.borrow();
    assert_eq!(read.password, "Secret123");
    assert_eq!(read.customer.registered_since, 1_448_323_200);
    assert_eq!(read.customer.person.name, "Daniel");
    assert_eq!(read.customer.person.surname.as_deref(), Some("Huber"));
    assert_eq!(read.customer.person.gender, Gender::Male);
    assert_eq!(read.customer.books.len(), 1);
    assert_eq!(read.customer.books[0].borrow().title, "Frankenstein");

    // The base row is readable on its own.
    mapper.clear_cache();
    let person = mapper.read::<Person>(5).unwrap().unwrap();
    assert_eq!(person.borrow().surname.as_deref(), Some("Huber"));
}

#[test]
fn deleting_a_derived_object_removes_every_level() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = library(&conn);
    let daniel = special_customer(5, "Daniel", "Huber");
    mapper.save(&daniel).unwrap();

    mapper.delete(&daniel).unwrap();
    assert!(mapper.read::<SpecialCustomer>(5).unwrap().is_none());
    assert!(mapper.read::<Person>(5).unwrap().is_none());
}

#[test]
fn null_columns_read_back_as_none() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = library(&conn);
    let mary = author(4, "Mary", "M. Shelley", &[]);
    mapper.save(&mary).unwrap();
    mapper.clear_cache();

    let mary = mapper.read::<Author>(4).unwrap().unwrap();
    let mary = mary.borrow();
    assert_eq!(mary.person.surname, None);
    assert_eq!(mary.person.gender, Gender::Female);
    assert!(mary.books.is_empty());
}

#[test]
fn locking_selects_rows_inside_a_transaction() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);
    let h2 = mapper.read::<Book>("h2").unwrap().unwrap();
    let vip = special_customer(10, "Jonathan", "Harker");
    mapper.save(&vip).unwrap();

    mapper.start_transaction().unwrap();
    mapper.lock(&h2, LockMode::ForUpdate).unwrap();
    mapper.lock(&vip, LockMode::ForShare).unwrap();
    assert!(mapper.in_transaction());
    mapper.commit_transaction().unwrap();
}

#[test]
fn locking_a_missing_row_is_not_found() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);
    let ghost = book("zz", "Nowhere", &genre(1, "Horror"));

    mapper.start_transaction().unwrap();
    let err = mapper.lock(&ghost, LockMode::ForUpdate).unwrap_err();
    assert!(err.is_data_access());
    assert_eq!(err.query_kind(), Some(QueryErrorKind::NotFound));
    assert!(mapper.in_transaction());
    mapper.rollback_transaction().unwrap();
}

#[test]
fn resave_writes_separator_text_and_cleared_reference() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = library(&conn);
    let horror = genre(1, "Horror");
    mapper.save(&horror).unwrap();
    let b = book("b", "X", &horror);
    mapper.save(&b).unwrap();

    {
        let mut state = b.borrow_mut();
        state.title = "X|GID=1".to_string();
        state.genre = None;
    }
    mapper.save(&b).unwrap();
    mapper.clear_cache();

    let stored = mapper.read::<Book>("b").unwrap().unwrap();
    assert_eq!(stored.borrow().title, "X|GID=1");
    assert!(stored.borrow().genre.is_none());
}

#[test]
fn queries_filter_on_columns() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);

    let found = mapper
        .query::<Book>()
        .unwrap()
        .filter()
        .like("title", "d%")
        .execute()
        .unwrap();
    let titles: Vec<String> = found.iter().map(|b| b.borrow().title.clone()).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Dracula".to_string()));
    assert!(titles.contains(&"Der Herr der Ringe".to_string()));

    let found = mapper
        .query::<Book>()
        .unwrap()
        .filter()
        .not()
        .begin_set()
        .equals("GID", 1)
        .or()
        .in_list("BOOKID", ["nothing", "else"])
        .end_set()
        .execute()
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].borrow().book_id, "f1");
}

#[test]
fn queries_over_derived_types_see_inherited_columns() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = library(&conn);
    mapper.save(&author(1, "John", "J. R. R. Tolkien", &[])).unwrap();
    mapper.save(&author(2, "Suzanne", "S. Collins", &[])).unwrap();
    mapper.save(&author(4, "Mary", "M. Shelley", &[])).unwrap();

    let found = mapper
        .query::<Author>()
        .unwrap()
        .filter()
        .between("ID", 2, 4)
        .and()
        .is_null("SNAME")
        .and()
        .not_like("NAME", "s%")
        .execute()
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].borrow().abbreviated_name, "M. Shelley");
}

#[test]
fn rollback_discards_saved_rows() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = library(&conn);

    mapper.start_transaction().unwrap();
    mapper.save(&genre(4, "Sci-Fi")).unwrap();
    mapper.rollback_transaction().unwrap();
    assert!(mapper.read::<Genre>(4).unwrap().is_none());

    mapper.start_transaction().unwrap();
    mapper.save(&genre(4, "Sci-Fi")).unwrap();
    mapper.commit_transaction().unwrap();
    assert!(!mapper.in_transaction());
    assert_eq!(mapper.read::<Genre>(4).unwrap().unwrap().borrow().name, "Sci-Fi");
}

#[test]
fn unique_violation_leaves_the_transaction_for_the_caller() {
    let conn = SqliteConnection::open_memory().unwrap();
    let mut mapper = stocked(&conn);

    mapper.start_transaction().unwrap();
    let err = mapper.save(&genre(4, "Horror")).unwrap_err();
    assert!(err.is_data_access());
    assert_eq!(err.sqlstate(), Some("23505"));
    assert!(mapper.in_transaction());
    mapper.rollback_transaction().unwrap();

    assert!(mapper.read::<Genre>(4).unwrap().is_none());
}

#[test]
fn transaction_misuse_is_reported_before_any_sql() {
    let sqlite = SqliteConnection::open_memory().unwrap();
    let conn = CountingConnection::new(&sqlite);
    let mut mapper = Mapper::new(&conn);

    assert!(matches!(mapper.commit_transaction(), Err(Error::Transaction(_))));
    assert!(matches!(mapper.rollback_transaction(), Err(Error::Transaction(_))));
    mapper.start_transaction().unwrap();
    assert!(matches!(mapper.start_transaction(), Err(Error::Transaction(_))));
    assert_eq!(conn.writes.get(), 1);
}
