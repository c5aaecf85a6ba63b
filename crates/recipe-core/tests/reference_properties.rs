use alloy_primitives::Address;
use proptest::prelude::*;
use recipe_core::{decode, encode, Action, ComposerError, Recipe, Slot};

fn dai() -> Address {
    Address::repeat_byte(0xda)
}

// `n` supplies literales; la acción `j` referencia al paso `i`.
fn recipe_with_reference(n: usize, i: usize, j: usize) -> Recipe {
    let actions = (0..n).map(|k| {
                            let amount = if k == j { Slot::step(i) } else { Action::amount(k as u128 + 1) };
                            Action::supply(dai(), amount).unwrap()
                        })
                        .collect();
    Recipe::new("prop", actions)
}

proptest! {
    #[test]
    fn encoding_fails_iff_reference_does_not_precede(n in 1usize..10, i in 0usize..12, j_seed in 0usize..10) {
        let j = j_seed % n;
        let recipe = recipe_with_reference(n, i, j);
        let encoded = encode(&recipe);
        if i >= j {
            prop_assert_eq!(encoded, Err(ComposerError::InvalidReference { action: j, step: i }));
        } else {
            let bytes = encoded.unwrap();
            prop_assert_eq!(decode(&bytes).unwrap(), recipe);
        }
    }

    #[test]
    fn builder_agrees_with_encoder(n in 1usize..10, i in 0usize..12, j_seed in 0usize..10) {
        let j = j_seed % n;
        let recipe = recipe_with_reference(n, i, j);
        let built = recipe.actions()
                          .iter()
                          .cloned()
                          .try_fold(Recipe::builder("prop"), |b, a| b.then(a))
                          .and_then(|b| b.build());
        prop_assert_eq!(built.is_ok(), encode(&recipe).is_ok());
    }
}

#[test]
fn positional_tokens_map_to_previous_steps() {
    let recipe = Recipe::builder("tokens").then(Action::supply(dai(), Action::amount(5)).unwrap())
                                          .unwrap()
                                          .then(Action::withdraw(dai(), Slot::parse_token("$1").unwrap()).unwrap())
                                          .unwrap()
                                          .build()
                                          .unwrap();
    assert_eq!(recipe.actions()[1].inputs()[1], Slot::step(0));

    let err = Recipe::builder("tokens").then(Action::supply(dai(), Slot::parse_token("$1").unwrap()).unwrap())
                                       .unwrap_err();
    assert_eq!(err, ComposerError::InvalidReference { action: 0, step: 0 });
}
