//! End-to-end scenarios exercising the full load → analyze → run pipeline
//! through both execution engines, each asserting the same exit code from
//! `-e ast` and `-e vm`.

use flx::{Engine, Executor, MemoryLoader};

fn run_both(src: &'static str) -> (i32, i32) {
    let loader = MemoryLoader::new([("main", src)]);
    let executor = Executor::load(&loader, "main").unwrap();
    let ast = executor.run(Engine::Ast).unwrap();
    let vm = executor.run(Engine::Vm).unwrap();
    (ast, vm)
}

#[test]
fn arithmetic_precedence() {
    let src = "func main(): int { return 2 + 3 * 4; } exit(main());";
    assert_eq!(run_both(src), (14, 14));
}

#[test]
fn foreach_accumulates_over_an_array() {
    let src = "\
        let xs: int[] = [1, 2, 3];
        let s: int = 0;
        foreach (x in xs) { s += x; }
        exit(s);
    ";
    assert_eq!(run_both(src), (6, 6));
}

#[test]
fn struct_literal_and_field_access() {
    let src = "\
        struct Point { x: int; y: int; }
        let p = Point { x: 2, y: 3 };
        exit(p.x + p.y);
    ";
    assert_eq!(run_both(src), (5, 5));
}

#[test]
fn overload_resolution_and_ternary() {
    let src = r#"
        func add(a: int, b: int): int { return a + b; }
        func add(a: string, b: string): string { return a + b; }
        exit(add(add("a", "b") == "ab" ? 1 : 0, 0));
    "#;
    assert_eq!(run_both(src), (1, 1));
}

#[test]
fn division_by_zero_is_caught_by_try_catch() {
    let src = "\
        let i: int = 10;
        try { i = i / 0; } catch (e) { i = -1; }
        exit(i);
    ";
    assert_eq!(run_both(src), (-1, -1));
}

#[test]
fn string_index_assignment_mutates_in_place() {
    let src = r#"
        let s: string = "hello";
        s[0] = 'H';
        exit(s == "Hello" ? 0 : 1);
    "#;
    assert_eq!(run_both(src), (0, 0));
}
