/// Declare a struct together with its [`Record`](crate::Record) mapping.
///
/// The sheet declaration must be the first attribute of the struct after
/// any doc comments. Every field carries `#[sheet(title = ...)]`, optionally
/// followed by `format` and `validation`, and may be documented above it:
///
/// ```
/// use chrono::NaiveDate;
///
/// sheetmap::record! {
///     /// One order line
///     #[sheet(name = "Orders")]
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct Order {
///         /// Day the order was placed
///         #[sheet(title = "Day", format = "yyyy-MM-dd")]
///         pub day: NaiveDate,
///         #[sheet(title = "Region", validation = "North,South")]
///         pub region: String,
///         #[sheet(title = "Count")]
///         pub count: i64,
///     }
/// }
///
/// let schema = sheetmap::schema::resolve::<Order>().unwrap();
/// assert_eq!(schema.sheet_name(), "Orders");
/// assert_eq!(schema.titles(), vec!["Day", "Region", "Count"]);
/// ```
///
/// A struct without the sheet declaration still compiles, but resolving its
/// schema fails with a schema error.
#[macro_export]
macro_rules! record {
    (@opt) => { ::std::option::Option::None };
    (@opt $value:literal) => { ::std::option::Option::Some($value) };

    (
        @define $sheet:literal;
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                [$title:literal; $($format:literal)?; $($validation:literal)?]
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),*
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Record for $name {
            const SHEET: &'static str = $sheet;

            fn columns() -> ::std::vec::Vec<$crate::ColumnSpec> {
                ::std::vec![
                    $(
                        $crate::ColumnSpec::new(
                            ::std::stringify!($field),
                            $title,
                            <$ty as $crate::CellField>::KIND,
                        )
                        .with_format(
                            $crate::record!(@opt $($format)?)
                                .or(<$ty as $crate::CellField>::DEFAULT_FORMAT),
                        )
                        .with_validation($crate::record!(@opt $($validation)?)),
                    )*
                ]
            }

            fn to_row(&self, row: &mut $crate::RowWriter<'_>) -> $crate::SheetMapResult<()> {
                $( row.put($title, &self.$field)?; )*
                ::std::result::Result::Ok(())
            }

            fn from_row(row: &$crate::RowReader<'_>) -> $crate::SheetMapResult<Self> {
                ::std::result::Result::Ok(Self {
                    $( $field: row.get($title)?, )*
                })
            }
        }
    };

    (
        $(#[doc = $doc:literal])*
        #[sheet(name = $sheet:literal $(,)?)]
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[doc = $field_doc:literal])*
                #[sheet(
                    title = $title:literal
                    $(, format = $format:literal)?
                    $(, validation = $validation:literal)?
                    $(,)?
                )]
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $crate::record! {
            @define $sheet;
            $(#[doc = $doc])*
            $(#[$meta])*
            $vis struct $name {
                $(
                    [$title; $($format)?; $($validation)?]
                    $(#[doc = $field_doc])*
                    $(#[$field_meta])*
                    $field_vis $field : $ty
                ),*
            }
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[doc = $field_doc:literal])*
                #[sheet(
                    title = $title:literal
                    $(, format = $format:literal)?
                    $(, validation = $validation:literal)?
                    $(,)?
                )]
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $crate::record! {
            @define "";
            $(#[$meta])*
            $vis struct $name {
                $(
                    [$title; $($format)?; $($validation)?]
                    $(#[doc = $field_doc])*
                    $(#[$field_meta])*
                    $field_vis $field : $ty
                ),*
            }
        }
    };
}
