//! Tests for dispatch resolution.

use std::ptr;

use parking_lot::Mutex;

use crate::class;
use crate::class::{Class, ClassInfo, Object};
use crate::config::DispatchConfig;

use super::result::{DispatchResult, MissReason};
use super::resolver::{Request, Resolver};
use super::table::{CandidateTable, Dispatch, StaticDispatch, TableBuilder, TypeToken};
use super::types::{ResolutionMode, SubjectKind};
use super::Dispatcher;

struct Animal {
    name: &'static str,
}
struct Mammal {
    base: Animal,
}
struct Dog {
    base: Mammal,
}
struct Cat {
    base: Mammal,
}
struct Fish {
    base: Animal,
}

class!(Animal);
class!(Mammal: Animal => base);
class!(Dog: Mammal => base);
class!(Cat: Mammal => base);
class!(Fish: Animal => base);

fn dog() -> Dog {
    Dog {
        base: Mammal {
            base: Animal { name: "rex" },
        },
    }
}

fn cat() -> Cat {
    Cat {
        base: Mammal {
            base: Animal { name: "tom" },
        },
    }
}

fn fish() -> Fish {
    Fish {
        base: Animal { name: "nemo" },
    }
}

#[derive(Default)]
struct Keeper {
    log: Mutex<Vec<String>>,
}

impl Keeper {
    fn record(&self, entry: impl Into<String>) {
        self.log.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl Dispatch for Keeper {
    fn register(table: &mut TableBuilder<'_, Self>) {
        table
            .procedure("feed", |k: &Keeper, a: &Animal| k.record(format!("animal:{}", a.name)))
            .procedure("feed", |k: &Keeper, m: &Mammal| k.record(format!("mammal:{}", m.base.name)))
            .procedure("feed", |k: &Keeper, _: &Dog| k.record("dog"))
            .procedure_any("feed", |k: &Keeper, arg: &dyn Class| {
                k.record(format!("any:{}", arg.class()))
            })
            .procedure("count", |k: &Keeper, n: &i32| k.record(format!("i32:{n}")))
            .procedure_any("count", |k: &Keeper, arg: &dyn Class| {
                k.record(format!("any:{}", arg.class()))
            })
            .function("legs", |_: &Keeper, _: &Mammal| 4_i32)
            .function("legs", |_: &Keeper, _: &Fish| 0.0_f64)
            .function("measure", |_: &Keeper, _: &Dog| 30_i32)
            .function("measure", |_: &Keeper, _: &Dog| 30.5_f64)
            .function("clone", |_: &Keeper, _: &Dog| dog())
            .procedure("legs", |k: &Keeper, _: &Mammal| k.record("legs procedure"));
    }
}

fn resolve<'t, S>(
    table: &'t CandidateTable<S>,
    mode: ResolutionMode,
    request: Request<'_>,
    arg: Option<&dyn Class>,
) -> DispatchResult<'t, S> {
    Resolver::new(table, mode, 64).resolve(&request, arg)
}

fn keeper_table() -> CandidateTable<Keeper> {
    CandidateTable::build(&DispatchConfig::default())
}

#[test]
fn test_exact_match() {
    let table = keeper_table();
    let request = Request::procedure("feed", Animal::static_class());

    let result = resolve(&table, ResolutionMode::Direct, request, Some(&dog()));
    match result {
        DispatchResult::Resolved(candidate) => {
            assert_eq!(candidate.parameter, Dog::static_class());
            assert!(candidate.is_procedure());
        }
        other => panic!("Expected Resolved, got {:?}", other),
    }
}

#[test]
fn test_nearest_ancestor_wins() {
    let table = keeper_table();
    let request = Request::procedure("feed", Animal::static_class());

    let result = resolve(&table, ResolutionMode::Direct, request, Some(&cat()));
    let candidate = result.candidate().expect("Cat should resolve through Mammal");
    assert_eq!(candidate.parameter, Mammal::static_class());
}

#[test]
fn test_walk_passes_declared_class() {
    let table = keeper_table();

    // Fish's only ancestor is the declared class itself.
    let request = Request::procedure("feed", Animal::static_class());
    let result = resolve(&table, ResolutionMode::Direct, request, Some(&fish()));
    assert_eq!(result.candidate().map(|c| c.parameter), Some(Animal::static_class()));

    // Declared as Mammal, Cat walks on to Mammal.
    let request = Request::procedure("feed", Mammal::static_class());
    let result = resolve(&table, ResolutionMode::Direct, request, Some(&cat()));
    assert_eq!(result.candidate().map(|c| c.parameter), Some(Mammal::static_class()));
}

#[test]
fn test_derived_argument_reaches_ancestor_above_declared() {
    struct Groomer;

    impl Dispatch for Groomer {
        fn register(table: &mut TableBuilder<'_, Self>) {
            table.procedure("groom", |_: &Groomer, _: &Animal| {});
        }
    }

    let table = CandidateTable::<Groomer>::build(&DispatchConfig::default());
    let request = Request::procedure("groom", Mammal::static_class());

    // A Mammal and a Dog declared as Mammal both end at Animal.
    let mammal = Mammal {
        base: Animal { name: "generic" },
    };
    let dog = dog();
    for arg in [&mammal as &dyn Class, &dog] {
        let result = resolve(&table, ResolutionMode::Direct, request, Some(arg));
        assert_eq!(result.candidate().map(|c| c.parameter), Some(Animal::static_class()));
    }
}

#[test]
fn test_exact_class_wins_when_declared() {
    let table = keeper_table();
    let animal = Animal { name: "generic" };

    let request = Request::procedure("feed", Animal::static_class());
    match resolve(&table, ResolutionMode::Direct, request, Some(&animal)) {
        DispatchResult::Resolved(candidate) => {
            assert_eq!(candidate.parameter, Animal::static_class())
        }
        other => panic!("Expected Resolved, got {:?}", other),
    }

    let request = Request::procedure("feed", Dog::static_class());
    let result = resolve(&table, ResolutionMode::Direct, request, Some(&dog()));
    assert_eq!(result.candidate().map(|c| c.parameter), Some(Dog::static_class()));

    let keeper = Keeper::default();
    let dispatcher = Dispatcher::<Keeper>::new();
    assert!(dispatcher.invoke::<Mammal>(&keeper, "feed", Some(&dog().base)));
    assert!(dispatcher.invoke::<Dog>(&keeper, "feed", Some(&dog())));
    assert_eq!(keeper.entries(), vec!["mammal:rex", "dog"]);
}

#[test]
fn test_surrogate_mode_walks_full_chain() {
    let table = keeper_table();
    let request = Request::procedure("feed", Animal::static_class());

    let animal = Animal { name: "generic" };
    let result = resolve(&table, ResolutionMode::Surrogate, request, Some(&animal));
    assert_eq!(result.candidate().map(|c| c.parameter), Some(Animal::static_class()));

    let result = resolve(&table, ResolutionMode::Surrogate, request, Some(&fish()));
    assert_eq!(result.candidate().map(|c| c.parameter), Some(Animal::static_class()));
}

#[test]
fn test_reference_walk_excludes_object() {
    struct Stone;
    class!(Stone);

    let table = keeper_table();
    let request = Request::procedure("feed", ClassInfo::object());
    for mode in [ResolutionMode::Direct, ResolutionMode::Surrogate] {
        match resolve(&table, mode, request, Some(&Stone)) {
            DispatchResult::NoMatch(miss) => assert_eq!(miss.reason, MissReason::NotApplicable),
            other => panic!("Expected NoMatch in {:?}, got {:?}", mode, other),
        }
    }
}

#[test]
fn test_value_type_exact_match() {
    let table = keeper_table();
    let request = Request::procedure("count", ClassInfo::object());

    let result = resolve(&table, ResolutionMode::Direct, request, Some(&3_i32));
    assert_eq!(result.candidate().map(|c| c.parameter), Some(i32::static_class()));
}

#[test]
fn test_value_type_object_fallback() {
    let table = keeper_table();

    // No u8 candidate: falls back to the Object entry.
    for declared in [u8::static_class(), ClassInfo::object()] {
        let request = Request::procedure("count", declared);
        match resolve(&table, ResolutionMode::Direct, request, Some(&3_u8)) {
            DispatchResult::Resolved(candidate) => {
                assert_eq!(candidate.parameter, ClassInfo::object());
            }
            other => panic!("Expected Resolved, got {:?}", other),
        }
    }

    let request = Request::procedure("count", ClassInfo::object());
    let result = resolve(&table, ResolutionMode::Surrogate, request, Some(&3_u8));
    assert!(result.is_resolved());

    let keeper = Keeper::default();
    let dispatcher = Dispatcher::<Keeper>::new();
    assert!(dispatcher.invoke::<Object>(&keeper, "count", Some(&3_u8)));
    assert_eq!(keeper.entries(), vec!["any:u8"]);
}

#[test]
fn test_value_type_reaches_function_any() {
    let dispatcher = Dispatcher::<Registrar>::new();

    let same: Option<bool> = dispatcher.try_call::<Object, _>(&Registrar, "same", Some(&5_i64));
    assert_eq!(same, Some(true));
    let text = "plain".to_string();
    assert!(dispatcher.call::<Object, bool>(&Registrar, "same", Some(&text)));
}

#[test]
fn test_value_type_misses_without_object_entry() {
    let table = keeper_table();

    // `legs` has no Object entry: the exact probe and the Object probe both miss.
    let request = Request::function("legs", ClassInfo::object(), ClassInfo::object());
    match resolve(&table, ResolutionMode::Direct, request, Some(&3_u8)) {
        DispatchResult::NoMatch(miss) => {
            assert_eq!(miss.reason, MissReason::NotApplicable);
            assert_eq!(miss.probes, 2);
        }
        other => panic!("Expected NoMatch, got {:?}", other),
    }
}

#[test]
fn test_absent_argument() {
    let table = keeper_table();
    let request = Request::procedure("feed", Animal::static_class());

    match resolve(&table, ResolutionMode::Surrogate, request, None) {
        DispatchResult::NoMatch(miss) => {
            assert_eq!(miss.reason, MissReason::NoArgument);
            assert_eq!(miss.arg_class, None);
            assert_eq!(
                miss.to_string(),
                "no `feed` candidate for an absent argument (NoArgument after 0 probes)"
            );
        }
        other => panic!("Expected NoMatch, got {:?}", other),
    }
}

#[test]
fn test_unknown_name() {
    let table = keeper_table();

    let request = Request::procedure("groom", Animal::static_class());
    match resolve(&table, ResolutionMode::Direct, request, Some(&dog())) {
        DispatchResult::NoMatch(miss) => assert_eq!(miss.reason, MissReason::UnknownName),
        other => panic!("Expected NoMatch, got {:?}", other),
    }

    // `clone` exists only as a function.
    let request = Request::procedure("clone", Animal::static_class());
    match resolve(&table, ResolutionMode::Direct, request, Some(&dog())) {
        DispatchResult::NoMatch(miss) => assert_eq!(miss.reason, MissReason::UnknownName),
        other => panic!("Expected NoMatch, got {:?}", other),
    }
}

#[test]
fn test_covariant_return_selection() {
    let keeper = Keeper::default();
    let dispatcher = Dispatcher::<Keeper>::new();

    let as_int: Option<i32> = dispatcher.try_call::<Animal, _>(&keeper, "measure", Some(&dog()));
    let as_float: Option<f64> = dispatcher.try_call::<Animal, _>(&keeper, "measure", Some(&dog()));
    let as_text: Option<String> =
        dispatcher.try_call::<Animal, _>(&keeper, "measure", Some(&dog()));
    assert_eq!(as_int, Some(30));
    assert_eq!(as_float, Some(30.5));
    assert_eq!(as_text, None);

    // Object accepts any return; the first registration wins.
    let object: Option<Object> = dispatcher.try_call::<Animal, _>(&keeper, "measure", Some(&dog()));
    let object = object.expect("Object accepts every return class");
    assert_eq!(object.downcast_ref::<i32>(), Some(&30));
}

#[test]
fn test_covariance_continues_up_the_walk() {
    let keeper = Keeper::default();
    let dispatcher = Dispatcher::<Keeper>::new();

    // Mammal's `legs` returns i32; asking for f64 finds nothing on Cat's chain.
    assert_eq!(dispatcher.try_call::<Animal, i32>(&keeper, "legs", Some(&cat())), Some(4));
    assert_eq!(dispatcher.try_call::<Animal, f64>(&keeper, "legs", Some(&cat())), None);
    assert_eq!(dispatcher.call_or::<Animal, f64>(&keeper, "legs", Some(&cat()), -1.0), -1.0);
}

#[test]
fn test_procedures_and_functions_are_separate() {
    let keeper = Keeper::default();
    let dispatcher = Dispatcher::<Keeper>::new();

    assert!(dispatcher.invoke::<Animal>(&keeper, "legs", Some(&dog())));
    assert_eq!(dispatcher.call::<Animal, i32>(&keeper, "legs", Some(&dog())), 4);
    assert_eq!(keeper.entries(), vec!["legs procedure"]);

    let table = dispatcher.table();
    assert_eq!(table.procedure_count(), 7);
    assert_eq!(table.function_count(), 5);
    assert_eq!(table.functions("measure", &Dog::static_class()).count(), 2);
    assert!(table.procedure("measure", &Dog::static_class()).is_none());
}

#[test]
fn test_function_result_upcasts_to_expected() {
    let keeper = Keeper::default();
    let dispatcher = Dispatcher::<Keeper>::new();

    let animal: Option<Animal> = dispatcher.try_call::<Animal, _>(&keeper, "clone", Some(&dog()));
    assert_eq!(animal.map(|a| a.name), Some("rex"));

    let cat: Option<Cat> = dispatcher.try_call::<Animal, _>(&keeper, "clone", Some(&dog()));
    assert!(cat.is_none());
}

#[test]
fn test_object_argument_dispatches_on_content() {
    let keeper = Keeper::default();
    let dispatcher = Dispatcher::<Keeper>::new();

    let boxed = Object::new(cat());
    assert!(dispatcher.invoke::<Animal>(&keeper, "feed", Some(&boxed)));
    let boxed = Object::new(7_i32);
    assert!(dispatcher.invoke::<Object>(&keeper, "count", Some(&boxed)));
    assert_eq!(keeper.entries(), vec!["mammal:tom", "i32:7"]);
}

#[test]
fn test_invoke_fallback() {
    struct Stone;
    class!(Stone);

    let keeper = Keeper::default();
    let dispatcher = Dispatcher::<Keeper>::new();

    dispatcher.invoke_or_else::<Object, _>(&keeper, "feed", Some(&Stone), || {
        keeper.record("fallback")
    });
    dispatcher.invoke_or_else::<Animal, _>(&keeper, "feed", None, || keeper.record("absent"));
    dispatcher.invoke_or_else::<Animal, _>(&keeper, "feed", Some(&dog()), || {
        keeper.record("unused")
    });
    assert_eq!(keeper.entries(), vec!["fallback", "absent", "dog"]);

    let name: String =
        dispatcher.call_or_else::<Animal, _, _>(&keeper, "name", Some(&dog()), || "none".into());
    assert_eq!(name, "none");
}

#[test]
fn test_depth_bound() {
    let table = keeper_table();
    let request = Request::procedure("feed", ClassInfo::object());

    // Cat: Mammal is at depth 0, reachable.
    let resolver = Resolver::new(&table, ResolutionMode::Surrogate, 1);
    let result = resolver.resolve(&request, Some(&cat()));
    assert!(result.is_resolved());

    // Fish needs Animal at depth 0 too; a zero bound refuses any walk.
    match Resolver::new(&table, ResolutionMode::Surrogate, 0).resolve(&request, Some(&fish())) {
        DispatchResult::NoMatch(miss) => assert_eq!(miss.reason, MissReason::DepthExceeded),
        other => panic!("Expected NoMatch, got {:?}", other),
    }
}

#[test]
fn test_depth_bound_from_config() {
    struct Shallow;

    impl Dispatch for Shallow {
        fn register(table: &mut TableBuilder<'_, Self>) {
            table.procedure("feed", |_: &Shallow, _: &Animal| {});
        }
    }

    let config = DispatchConfig {
        max_hierarchy_depth: 1,
        ..DispatchConfig::default()
    };
    let dispatcher = Dispatcher::<Shallow>::with_config(config.into());

    // Dog -> Mammal (depth 0) -> Animal (depth 1, refused).
    assert!(!dispatcher.invoke::<Object>(&Shallow, "feed", Some(&dog())));
    assert!(dispatcher.invoke::<Object>(&Shallow, "feed", Some(&fish())));
}

struct Registrar;

impl Dispatch for Registrar {
    fn register(table: &mut TableBuilder<'_, Self>) {
        table
            .function("pick", |_: &Registrar, _: &Dog| "first".to_string())
            .function("pick", |_: &Registrar, _: &Dog| "second".to_string())
            .procedure_any("eq", |_: &Registrar, _: &dyn Class| {})
            .procedure("eq", |_: &Registrar, _: &Dog| {})
            .procedure("", |_: &Registrar, _: &Dog| {})
            .procedure("wrapped", |_: &Registrar, _: &Object| {})
            .function_any("same", |_: &Registrar, _: &dyn Class| true);
    }
}

#[test]
fn test_duplicate_registration_first_wins() {
    let dispatcher = Dispatcher::<Registrar>::new();
    let picked: String = dispatcher.call::<Animal, _>(&Registrar, "pick", Some(&dog()));
    assert_eq!(picked, "first");
    assert_eq!(dispatcher.table().functions("pick", &Dog::static_class()).count(), 1);
}

#[test]
fn test_registration_exclusions() {
    let table = CandidateTable::<Registrar>::build(&DispatchConfig::default());
    assert_eq!(
        table.signatures(),
        vec!["eq(Dog)", "pick(Dog) -> String", "same(Object) -> bool"]
    );

    let config = DispatchConfig {
        equality_operation: "same".to_string(),
        ..DispatchConfig::default()
    };
    let table = CandidateTable::<Registrar>::build(&config);
    assert_eq!(table.signatures(), vec!["eq(Dog)", "eq(Object)", "pick(Dog) -> String"]);
}

#[test]
fn test_rebuild_is_idempotent() {
    let config = DispatchConfig::default();
    let first = CandidateTable::<Keeper>::build(&config);
    let second = CandidateTable::<Keeper>::build(&config);
    assert_eq!(first.signatures(), second.signatures());
    assert_eq!(first.len(), second.len());
    assert_eq!(first.kind(), SubjectKind::Instance);
}

#[test]
fn test_empty_table() {
    struct Inert;

    impl Dispatch for Inert {
        fn register(_: &mut TableBuilder<'_, Self>) {}
    }

    let dispatcher = Dispatcher::<Inert>::new();
    assert!(!dispatcher.is_built());
    assert!(!dispatcher.invoke::<Animal>(&Inert, "feed", Some(&dog())));
    assert_eq!(dispatcher.call::<Animal, i32>(&Inert, "legs", Some(&dog())), 0);
    assert!(dispatcher.is_built());
    assert!(dispatcher.table().is_empty());
}

#[test]
fn test_prepared_dispatcher_is_built() {
    let dispatcher = Dispatcher::<Keeper>::prepared();
    assert!(dispatcher.is_built());
    assert_eq!(dispatcher.mode(), ResolutionMode::Direct);
    assert_eq!(dispatcher.table().subject(), std::any::type_name::<Keeper>());
}

struct Sizes;

impl StaticDispatch for Sizes {
    fn register_static(table: &mut TableBuilder<'_, TypeToken<Self>>) {
        table
            .operation_fn("size", |_: &Dog| "medium")
            .operation_fn("size", |_: &Cat| "small")
            .operation_fn("size", |n: &u64| if *n > 10 { "large" } else { "tiny" })
            .operation("check", |_: &Animal| {});
    }
}

#[test]
fn test_type_level_dispatch() {
    let dispatcher = Dispatcher::<TypeToken<Sizes>>::for_type();
    let token = TypeToken::<Sizes>::new();

    assert_eq!(dispatcher.call::<Animal, &str>(&token, "size", Some(&dog())), "medium");
    assert_eq!(dispatcher.call::<Animal, &str>(&token, "size", Some(&cat())), "small");
    assert_eq!(dispatcher.call::<Object, &str>(&token, "size", Some(&42_u64)), "large");
    assert_eq!(dispatcher.try_call::<Animal, &str>(&token, "size", Some(&fish())), None);
    assert!(dispatcher.invoke::<Object>(&token, "check", Some(&fish())));
    assert_eq!(dispatcher.table().kind(), SubjectKind::Type);
}

#[test]
fn test_type_level_table_is_shared() {
    let first = Dispatcher::<TypeToken<Sizes>>::for_type();
    let second = Dispatcher::<TypeToken<Sizes>>::for_type();
    assert!(first.is_built());
    assert!(ptr::eq(first.table(), second.table()));
}
