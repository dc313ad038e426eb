//! End-to-end compilation scenarios, executed on the SSA interpreter.

mod common;

use common::{run_main, run_main_preprocessed};

#[test]
fn for_sum_returns_15() {
    let source = "int main(){ int s=0; for(int i=1;i<=5;i=i+1) s=s+i; return s; }";
    assert_eq!(run_main(source), 15);
}

#[test]
fn short_circuit_and_suppresses_side_effect() {
    let source = r#"
        int side() { return 99; }
        int main() {
            int a = 0;
            int b = 3;
            if (a && (b = side())) {
                return 0;
            }
            return b;
        }
    "#;
    assert_eq!(run_main(source), 3);
}

#[test]
fn short_circuit_or_suppresses_side_effect() {
    let source = r#"
        int side() { return 99; }
        int main() {
            int a = 1;
            int b = 3;
            if (a || (b = side())) {
                return b;
            }
            return 0;
        }
    "#;
    assert_eq!(run_main(source), 3);
}

#[test]
fn break_in_while_returns_15() {
    let source = r#"
        int main() {
            int s = 0;
            int i = 1;
            while (1) {
                if (i == 6) {
                    break;
                }
                s = s + i;
                i = i + 1;
            }
            return s;
        }
    "#;
    assert_eq!(run_main(source), 15);
}

#[test]
fn compound_assignment_returns_25() {
    let source = r#"
        int main() {
            int x = 10;
            x += 5;
            x -= 3;
            x *= 2;
            x /= 2;
            x %= 5;
            x += 23;
            return x;
        }
    "#;
    assert_eq!(run_main(source), 25);
}

#[test]
fn pointer_depth_two_returns_11() {
    let source = "int main(){ int x=42; int *p=&x; int **pp=&p; **pp=11; return x; }";
    assert_eq!(run_main(source), 11);
}

#[test]
fn mutual_recursion_even_10_returns_1() {
    let source = r#"
        int even(int);
        int odd(int n) { return n == 0 ? 0 : even(n - 1); }
        int even(int n) { return n == 0 ? 1 : odd(n - 1); }
        int main() { return even(10); }
    "#;
    assert_eq!(run_main(source), 1);
}

// ============ Boundary behaviours ============

#[test]
fn while_zero_never_enters_body() {
    let source = r#"
        int main() {
            int s = 7;
            while (0) {
                s = 1;
                break;
            }
            return s;
        }
    "#;
    assert_eq!(run_main(source), 7);
}

#[test]
fn empty_for_header_loops_until_break() {
    let source = r#"
        int main() {
            int i = 0;
            for (;;) {
                i = i + 1;
                if (i == 4) {
                    break;
                }
            }
            return i;
        }
    "#;
    assert_eq!(run_main(source), 4);
}

#[test]
fn continue_skips_an_iteration() {
    let source = r#"
        int main() {
            int s = 0;
            for (int i = 1; i <= 5; i = i + 1) {
                if (i == 3) {
                    continue;
                }
                s = s + i;
            }
            return s;
        }
    "#;
    assert_eq!(run_main(source), 12);
}

#[test]
fn ternary_selects_by_condition() {
    assert_eq!(run_main("int main(){ int x=5; return x>3 ? 10 : 20; }"), 10);
    assert_eq!(run_main("int main(){ int x=1; return x>3 ? 10 : 20; }"), 20);
}

#[test]
fn prefix_and_postfix_increment_values() {
    let source = r#"
        int main() {
            int x = 5;
            int a = ++x;
            int b = x++;
            return a * 100 + b * 10 + x;
        }
    "#;
    // a = 6, b = 6, x = 7
    assert_eq!(run_main(source), 667);
}

#[test]
fn decrement_loop_counts_down() {
    let source = r#"
        int main() {
            int n = 5;
            int s = 0;
            while (n > 0) {
                s = s + n;
                --n;
            }
            return s;
        }
    "#;
    assert_eq!(run_main(source), 15);
}

#[test]
fn pointer_depth_three_writes_through() {
    let source = r#"
        int main() {
            int x = 1;
            int *p = &x;
            int **pp = &p;
            int ***ppp = &pp;
            ***ppp = 9;
            return **pp + x;
        }
    "#;
    assert_eq!(run_main(source), 18);
}

#[test]
fn pointer_write_through_single_level() {
    let source = "int main(){ int x=42; int *p=&x; *p = 5; return x; }";
    assert_eq!(run_main(source), 5);
}

#[test]
fn arithmetic_operators() {
    assert_eq!(run_main("int main(){ return 7 + 3 * 4 - 10 / 5; }"), 17);
    assert_eq!(run_main("int main(){ return 17 % 5; }"), 2);
    assert_eq!(run_main("int main(){ return -(0 - 8); }"), 8);
}

#[test]
fn signed_division_truncates_toward_zero() {
    assert_eq!(run_main("int main(){ return (0 - 7) / 2; }"), -3);
    assert_eq!(run_main("int main(){ return (0 - 7) % 2; }"), -1);
}

#[test]
fn bitwise_and_shift_operators() {
    assert_eq!(run_main("int main(){ return 6 & 3; }"), 2);
    assert_eq!(run_main("int main(){ return 6 | 3; }"), 7);
    assert_eq!(run_main("int main(){ return 6 ^ 3; }"), 5);
    assert_eq!(run_main("int main(){ return 1 << 4; }"), 16);
    assert_eq!(run_main("int main(){ return 32 >> 2; }"), 8);
    assert_eq!(run_main("int main(){ return ~5 + 6; }"), 0);
}

#[test]
fn comparisons_yield_integer_zero_or_one() {
    assert_eq!(run_main("int main(){ return (3 < 5) + (5 <= 5) + (5 > 3) + (3 >= 4); }"), 3);
    assert_eq!(run_main("int main(){ return (2 == 2) * 10 + (2 != 2); }"), 10);
}

#[test]
fn char_and_radix_literals() {
    assert_eq!(run_main("int main(){ return 'A'; }"), 65);
    assert_eq!(run_main("int main(){ return 0x10 + 010; }"), 24);
}

#[test]
fn sizeof_is_the_stub_constant() {
    assert_eq!(run_main("int main(){ return sizeof(int); }"), 4);
    assert_eq!(run_main("int main(){ int x = 0; return sizeof x; }"), 4);
}

#[test]
fn function_arguments_pass_left_to_right() {
    let source = r#"
        int weigh(int a, int b, int c) { return a * 100 + b * 10 + c; }
        int main() { return weigh(1, 2, 3); }
    "#;
    assert_eq!(run_main(source), 123);
}

#[test]
fn recursion_computes_factorial() {
    let source = r#"
        int fact(int n) { return n <= 1 ? 1 : n * fact(n - 1); }
        int main() { return fact(5); }
    "#;
    assert_eq!(run_main(source), 120);
}

#[test]
fn scoped_shadowing_in_blocks() {
    let source = r#"
        int main() {
            int x = 1;
            {
                int y = 10;
                x = x + y;
            }
            return x;
        }
    "#;
    assert_eq!(run_main(source), 11);
}

#[test]
fn assignment_value_chains() {
    let source = "int main(){ int a; int b; a = b = 4; return a + b; }";
    assert_eq!(run_main(source), 8);
}

#[test]
fn nested_short_circuits() {
    let source = r#"
        int boom() { return 100; }
        int main() {
            int hits = 0;
            if (1 && (0 || 1)) {
                hits = hits + 1;
            }
            if (0 && boom()) {
                hits = hits + 100;
            }
            if (1 || boom()) {
                hits = hits + 1;
            }
            return hits;
        }
    "#;
    assert_eq!(run_main(source), 2);
}

// ============ Preprocessed end-to-end ============

#[test]
fn object_macros_through_the_pipeline() {
    let source = r#"
#define MAX 100
#define MIN 95
int main() { return MAX - MIN; }
"#;
    assert_eq!(run_main_preprocessed(source), 5);
}

#[test]
fn function_macros_through_the_pipeline() {
    let source = r#"
#define ADD(a, b) ((a) + (b))
#define MIN_VAL 1
int main() {
    int result = ADD(MIN_VAL, 4);
    return result;
}
"#;
    assert_eq!(run_main_preprocessed(source), 5);
}

#[test]
fn conditional_compilation_selects_a_branch() {
    let source = r#"
#define FAST 1
#if defined(FAST)
int speed() { return 9; }
#else
int speed() { return 1; }
#endif
int main() { return speed(); }
"#;
    assert_eq!(run_main_preprocessed(source), 9);
}

#[test]
fn elif_chain_through_the_pipeline() {
    let source = r#"
#define B 1
#if defined(A)
int pick() { return 1; }
#elif defined(B)
int pick() { return 2; }
#else
int pick() { return 3; }
#endif
int main() { return pick(); }
"#;
    assert_eq!(run_main_preprocessed(source), 2);
}
