pub mod mealdb;
