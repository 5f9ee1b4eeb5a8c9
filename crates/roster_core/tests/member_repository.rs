use roster_core::db::open_db_in_memory;
use roster_core::model::EntityId;
use roster_core::{
    Member, MemberCustomRepository, MemberRepository, RepoError, Session, SessionConfig,
    SqliteMemberRepository, SqliteTeamRepository, Team, TeamRepository, UsernameOnly,
    UsernameOnlyDto,
};
use rusqlite::Connection;

fn begin(conn: &mut Connection) -> Session<'_> {
    Session::begin(conn, SessionConfig::default()).unwrap()
}

#[test]
fn save_then_find_by_id_returns_equal_member() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let saved = repo.save(Member::new("memberA", 10)).unwrap();
    let id = saved.id().expect("save assigns an id");

    let statements = repo.session().statement_count();
    let found = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(found, saved);
    assert_eq!(found.username, "memberA");
    assert_eq!(
        repo.session().statement_count(),
        statements,
        "managed member is served from the identity map"
    );
}

#[test]
fn find_by_id_reports_absence_as_none() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let saved = repo.save(Member::new("memberA", 10)).unwrap();
    let id = saved.id().unwrap();
    repo.delete(saved).unwrap();

    assert_eq!(repo.find_by_id(id).unwrap(), None);
}

#[test]
fn count_reflects_inserts_and_deletes() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let first = repo.save(Member::new("member1", 10)).unwrap();
    let second = repo.save(Member::new("member2", 20)).unwrap();
    repo.save(Member::new("member3", 30)).unwrap();
    assert_eq!(repo.count().unwrap(), 3);
    assert_eq!(repo.find_all().unwrap().len(), 3);

    repo.delete(first).unwrap();
    assert!(repo.delete_by_id(second.id().unwrap()).unwrap());
    assert_eq!(repo.count().unwrap(), 1);

    assert!(!repo.delete_by_id(second.id().unwrap()).unwrap());
}

#[test]
fn save_of_persisted_member_merges_changes() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let saved = repo.save(Member::new("member1", 10)).unwrap();
    let id = saved.id().unwrap();
    let mut changed = saved.clone();
    changed.age = 30;
    changed.username = "renamed".to_string();
    let merged = repo.save(changed).unwrap();
    assert_eq!(merged.id(), Some(id));

    repo.session().flush().unwrap();
    let (username, age): (String, i64) = repo
        .session()
        .connection()
        .query_row(
            "SELECT username, age FROM member WHERE member_id = ?1",
            [id.raw()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(username, "renamed");
    assert_eq!(age, 30);
}

#[test]
fn save_of_vanished_member_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let saved = repo.save(Member::new("member1", 10)).unwrap();
    let id = saved.id().unwrap();
    repo.session()
        .execute_update("DELETE FROM member WHERE member_id = ?1", [id.raw()])
        .unwrap();
    repo.session().clear();

    let err = repo.save(saved).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "member", id: raw } if raw == id.raw()));
}

#[test]
fn invalid_member_is_rejected_before_sql() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let statements = repo.session().statement_count();
    let err = repo.save(Member::new("  ", 10)).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(repo.session().statement_count(), statements);
}

#[test]
fn declared_predicate_filters_by_username_and_age() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    repo.save(Member::new("AAA", 10)).unwrap();
    repo.save(Member::new("AAA", 20)).unwrap();
    repo.save(Member::new("BBB", 30)).unwrap();

    let result = repo.find_by_username_and_age_greater_than("AAA", 15).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].username, "AAA");
    assert_eq!(result[0].age, 20);
}

#[test]
fn find_by_names_matches_any_listed_username() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    repo.save(Member::new("AAA", 10)).unwrap();
    repo.save(Member::new("BBB", 20)).unwrap();
    repo.save(Member::new("CCC", 30)).unwrap();

    let found = repo.find_by_names(&["AAA", "CCC"]).unwrap();
    let names = found.iter().map(|m| m.username.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["AAA", "CCC"]);
    assert!(repo.find_by_names(&[]).unwrap().is_empty());
}

#[test]
fn named_queries_resolve_registered_text() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    repo.save(Member::new("AAA", 10)).unwrap();
    repo.save(Member::new("BBB", 20)).unwrap();

    let by_username = repo.find_by_username("AAA").unwrap();
    assert_eq!(by_username.len(), 1);
    assert_eq!(by_username[0].age, 10);

    assert_eq!(repo.find_user("AAA", 10).unwrap().len(), 1);
    assert!(repo.find_user("AAA", 20).unwrap().is_empty());

    assert_eq!(repo.find_username_list().unwrap(), vec!["AAA", "BBB"]);
}

#[test]
fn member_dto_joins_team_name() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let team = SqliteTeamRepository::new(&mut session)
        .save(Team::new("teamA"))
        .unwrap();
    let mut repo = SqliteMemberRepository::new(&mut session);
    let member = repo.save(Member::with_team("AAA", 10, &team).unwrap()).unwrap();
    repo.save(Member::new("free agent", 20)).unwrap();

    let dtos = repo.find_member_dto().unwrap();
    assert_eq!(dtos.len(), 1, "members without a team are excluded");
    assert_eq!(dtos[0].id, member.id().unwrap());
    assert_eq!(dtos[0].username, "AAA");
    assert_eq!(dtos[0].team_name.as_deref(), Some("teamA"));
}

#[test]
fn projections_expose_only_the_requested_shape() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    repo.save(Member::new("m1", 0)).unwrap();
    repo.save(Member::new("m2", 0)).unwrap();
    repo.session().clear();

    let views: Vec<UsernameOnly> = repo.find_projections_by_username("m1").unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].username(), "m1");
    let json = serde_json::to_value(&views[0]).unwrap();
    assert_eq!(json, serde_json::json!({ "username": "m1" }));

    let dtos = repo
        .find_projections_by_username_as::<UsernameOnlyDto>("m1")
        .unwrap();
    assert_eq!(dtos, vec![UsernameOnlyDto::new("m1")]);
    assert_eq!(repo.session().managed_count(), 0, "projections are never tracked");
}

#[test]
fn eager_fetch_resolves_team_without_extra_statement() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut teams = SqliteTeamRepository::new(&mut session);
    let team_a = teams.save(Team::new("teamA")).unwrap();
    let team_b = teams.save(Team::new("teamB")).unwrap();
    let mut repo = SqliteMemberRepository::new(&mut session);
    repo.save(Member::with_team("member1", 10, &team_a).unwrap()).unwrap();
    repo.save(Member::with_team("member2", 10, &team_b).unwrap()).unwrap();
    repo.session().clear();

    let members = repo.find_member_fetch_join().unwrap();
    assert_eq!(members.len(), 2);
    let statements = repo.session().statement_count();
    let names = members
        .iter()
        .map(|member| repo.team_of(member).unwrap().unwrap().name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["teamA", "teamB"]);
    assert_eq!(repo.session().statement_count(), statements);

    for lookup in ["entity_graph", "entity_graph_by_username", "find_all"] {
        repo.session().clear();
        let members = match lookup {
            "entity_graph" => repo.find_member_entity_graph().unwrap(),
            "entity_graph_by_username" => repo.find_entity_graph_by_username("member1").unwrap(),
            _ => repo.find_all().unwrap(),
        };
        let statements = repo.session().statement_count();
        let team = repo.team_of(&members[0]).unwrap().unwrap();
        assert_eq!(team.name, "teamA", "{lookup}");
        assert_eq!(team.members(), &[members[0].id().unwrap()], "{lookup}");
        assert_eq!(repo.session().statement_count(), statements, "{lookup}");
    }
}

#[test]
fn lazy_lookup_resolves_team_with_one_statement() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let team = SqliteTeamRepository::new(&mut session)
        .save(Team::new("teamA"))
        .unwrap();
    let mut repo = SqliteMemberRepository::new(&mut session);
    repo.save(Member::with_team("member1", 10, &team).unwrap()).unwrap();
    repo.session().clear();

    let member = repo.find_by_username("member1").unwrap().remove(0);
    let statements = repo.session().statement_count();
    assert_eq!(repo.team_of(&member).unwrap().unwrap().name, "teamA");
    assert_eq!(repo.session().statement_count(), statements + 1);
}

#[test]
fn read_only_lookup_is_never_flushed() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let saved = repo.save(Member::new("member1", 10)).unwrap();
    let id = saved.id().unwrap();
    repo.session().flush().unwrap();
    repo.session().clear();

    let view = repo.find_read_only_by_username("member1").unwrap().unwrap();
    assert_eq!(view.age, 10);
    assert!(!repo.session().contains::<Member>(id));

    let mut copy = view.into_inner();
    copy.username = "member2".to_string();
    let statements = repo.session().statement_count();
    assert_eq!(repo.session().flush().unwrap(), 0);
    assert_eq!(repo.session().statement_count(), statements, "no UPDATE issued");

    let stored: String = repo
        .session()
        .connection()
        .query_row(
            "SELECT username FROM member WHERE member_id = ?1",
            [id.raw()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "member1");
}

#[test]
fn read_only_lookup_rejects_ambiguous_match() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);
    repo.save(Member::new("twin", 1)).unwrap();
    repo.save(Member::new("twin", 2)).unwrap();

    assert!(matches!(
        repo.find_read_only_by_username("twin"),
        Err(RepoError::NonUniqueResult { count: 2, .. })
    ));
    assert!(repo.find_read_only_by_username("nobody").unwrap().is_none());
}

#[test]
fn native_query_maps_columns_by_name() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);
    let saved = repo.save(Member::new("m1", 0)).unwrap();
    repo.save(Member::new("m2", 0)).unwrap();
    repo.session().clear();

    let found = repo.find_by_native_query("m1").unwrap().unwrap();
    assert_eq!(found.id(), saved.id());
    assert_eq!(found.username, "m1");
    assert!(repo.find_by_native_query("nobody").unwrap().is_none());
}

#[test]
fn malformed_native_sql_fails_at_execution() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    session.persist(&mut Member::new("m1", 0)).unwrap();

    let err = session
        .execute_native("selec * frm member", [], |row| row.get::<_, i64>(0))
        .unwrap_err();
    assert!(matches!(err, RepoError::MalformedNativeQuery { ref sql, .. } if sql == "selec * frm member"));

    let err = session
        .execute_native("SELECT username FROM member", [], |row| {
            row.get::<_, i64>("member_id")
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::MalformedNativeQuery { .. }));
}

#[test]
fn custom_lookup_is_reachable_through_the_same_repository() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);
    repo.save(Member::new("m1", 1)).unwrap();
    repo.save(Member::new("m2", 2)).unwrap();

    let members = repo.find_custom_member().unwrap();
    let names = members.iter().map(|m| m.username.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["m1", "m2"]);
}

#[test]
fn duplicate_team_name_is_a_constraint_violation() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut teams = SqliteTeamRepository::new(&mut session);
    teams.save(Team::new("teamA")).unwrap();

    let err = teams.save(Team::new("teamA")).unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert_eq!(teams.count().unwrap(), 1);
}

#[test]
fn team_with_members_cannot_be_deleted() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let team = SqliteTeamRepository::new(&mut session)
        .save(Team::new("teamA"))
        .unwrap();
    SqliteMemberRepository::new(&mut session)
        .save(Member::with_team("m1", 1, &team).unwrap())
        .unwrap();

    let mut teams = SqliteTeamRepository::new(&mut session);
    let err = teams.delete(team.clone()).unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert_eq!(teams.find_all().unwrap().len(), 1);
}
