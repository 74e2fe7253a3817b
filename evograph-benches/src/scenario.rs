//! Synthetic scenarios sized by [`EngineBenchParams`].
//!
//! Every scenario has a `users` and a `posts` population that both grow
//! over time, a random `follows` edge between users and a bounded `likes`
//! edge from users to posts. Churn on every population keeps the removal
//! paths of the engine busy.

use evograph_core::{EdgeConfig, EdgeTimeShift, ScenarioConfig, VertexConfig, VertexTimeShift};

use crate::{error::BenchSetupError, params::EngineBenchParams};

/// Builds the benchmark scenario for `params`, seeded with `seed`.
///
/// # Errors
/// Returns [`BenchSetupError::ZeroValue`] when the vertex count or the
/// iteration count is zero.
///
/// # Examples
/// ```
/// use evograph_benches::{params::EngineBenchParams, scenario::social_scenario};
///
/// let params = EngineBenchParams { vertex_count: 100, iterations: 10 };
/// let scenario = social_scenario(&params, 42)?;
/// assert_eq!(scenario.vertices.len(), 2);
/// assert_eq!(scenario.edges.len(), 2);
/// # Ok::<(), evograph_benches::error::BenchSetupError>(())
/// ```
pub fn social_scenario(
    params: &EngineBenchParams,
    seed: u64,
) -> Result<ScenarioConfig, BenchSetupError> {
    let EngineBenchParams {
        vertex_count,
        iterations,
    } = *params;
    if vertex_count == 0 {
        return Err(BenchSetupError::ZeroValue {
            context: "vertex_count",
        });
    }
    if iterations == 0 {
        return Err(BenchSetupError::ZeroValue {
            context: "iterations",
        });
    }

    let start = vertex_count.div_euclid(4);
    let churn = vertex_count.div_euclid(10);
    let vertices = |name| {
        VertexConfig::new(name, vertex_count).with_time_shift(
            VertexTimeShift::new(start, vertex_count - start).with_remove(churn),
        )
    };
    let follows = vertex_count.saturating_mul(2);
    let likes = vertex_count.saturating_mul(3);

    Ok(ScenarioConfig::new(iterations)
        .with_seed(seed)
        .with_vertex(vertices("users"))
        .with_vertex(vertices("posts"))
        .with_edge(
            EdgeConfig::new("follows", "users", "users")
                .with_count_all(follows)
                .with_random(true)
                .with_time_shift(
                    EdgeTimeShift::new(follows.div_euclid(4), follows - follows.div_euclid(4))
                        .with_remove(follows.div_euclid(10)),
                ),
        )
        .with_edge(
            EdgeConfig::new("likes", "users", "posts")
                .with_count_all(likes)
                .with_bounds(0, Some(vertex_count.div_euclid(2) + 1))
                .with_time_shift(EdgeTimeShift::new(0, likes).with_remove(likes.div_euclid(10))),
        ))
}
