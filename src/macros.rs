macro_rules! all_the_tuples {
    ($name:ident) => {
        $name!(0;);
        $name!(1; T1);
        $name!(2; T1, T2);
        $name!(3; T1, T2, T3);
        $name!(4; T1, T2, T3, T4);
        $name!(5; T1, T2, T3, T4, T5);
        $name!(6; T1, T2, T3, T4, T5, T6);
        $name!(7; T1, T2, T3, T4, T5, T6, T7);
        $name!(8; T1, T2, T3, T4, T5, T6, T7, T8);
        $name!(9; T1, T2, T3, T4, T5, T6, T7, T8, T9);
        $name!(10; T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
        $name!(11; T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
        $name!(12; T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
    };
}

/// Creates a `Box<dyn Trait>` from a value, optionally including supertraits.
///
/// Trait contracts are registered and requested as boxed trait objects.
///
/// # Syntax
/// ```text
/// boxed!(value; Trait [+ SuperTrait1 [+ SuperTrait2 ...]])
/// ```
///
/// # Examples
/// ```rust
/// use stackdi::boxed;
///
/// trait UserRepo {}
///
/// struct PostgresUserRepo;
///
/// impl UserRepo for PostgresUserRepo {}
///
/// let repo1: Box<dyn UserRepo> = boxed!(PostgresUserRepo; UserRepo);
/// let repo2: Box<dyn UserRepo + Send + Sync> = boxed!(PostgresUserRepo; UserRepo + Send + Sync);
/// ```
#[macro_export]
macro_rules! boxed {
    ($val:expr ; $trait:tt $($super_traits:tt)*) => {{
        Box::new($val) as Box<dyn $r#trait $($super_traits)*>
    }};
}
